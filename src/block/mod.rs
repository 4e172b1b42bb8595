//! Block Module
//!
//! Chunks byte streams into fixed-size blocks and reassembles them.
//!
//! ## Responsibilities
//! - Buffer arbitrary-sized writes into fixed-size blocks (`ChunkedWriter`)
//! - Persist one block per transaction under a dense sequence key (`BlockWriter`)
//! - Map byte offsets back onto blocks for seekable reads (`BlockReader`)
//!
//! ## Inode Layout
//! ```text
//! inodes/<id>/
//!   ├── 00 00 00 00 00 00 00 00  →  block 0 (block_size bytes)
//!   ├── 01 00 00 00 00 00 00 00  →  block 1 (block_size bytes)
//!   └── 02 00 00 00 00 00 00 00  →  block 2 (1..=block_size bytes)
//! ```
//! Keys are 8-byte little-endian sequence numbers starting at 0, with no gaps.

mod chunked;
mod reader;
mod writer;

pub use chunked::ChunkedWriter;
pub use reader::{BlockReader, ReadOutcome, Whence};
pub(crate) use reader::seek_args;
pub use writer::BlockWriter;

use crate::error::Result;

/// Size of a block key in bytes
pub const BLOCK_KEY_SIZE: usize = 8;

/// Destination for complete blocks
pub trait BlockSink {
    /// Persist one block; on error nothing is considered written
    fn write_block(&mut self, block: &[u8]) -> Result<()>;
}

impl<S: BlockSink + ?Sized> BlockSink for &mut S {
    fn write_block(&mut self, block: &[u8]) -> Result<()> {
        (**self).write_block(block)
    }
}

/// Storage key of block `index`
pub fn block_key(index: u64) -> [u8; BLOCK_KEY_SIZE] {
    index.to_le_bytes()
}

/// Block index encoded in `key`, if it is a well-formed block key
pub fn block_index(key: &[u8]) -> Option<u64> {
    let bytes: [u8; BLOCK_KEY_SIZE] = key.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}
