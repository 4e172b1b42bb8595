//! Block Writer
//!
//! Persists blocks into an inode namespace, one transaction per block.

use crate::error::{FsError, Result};
use crate::kv::{Database, Transaction};
use crate::path::BucketPath;

use super::{block_key, BlockSink};

/// Writes consecutive blocks under keys 0, 1, 2, ... of one inode
///
/// The block counter lives in memory only, so every new file version needs
/// a fresh writer over a freshly allocated inode.
pub struct BlockWriter<D: Database> {
    db: D,
    inode: BucketPath,
    /// Index the next block will be stored under
    next_block: u64,
    bytes_written: u64,
}

impl<D: Database> BlockWriter<D> {
    pub fn new(db: D, inode: BucketPath) -> Self {
        Self {
            db,
            inode,
            next_block: 0,
            bytes_written: 0,
        }
    }

    /// Number of blocks persisted so far
    pub fn blocks(&self) -> u64 {
        self.next_block
    }

    /// Total payload bytes persisted so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn inode(&self) -> &BucketPath {
        &self.inode
    }
}

impl<D: Database> BlockSink for BlockWriter<D> {
    fn write_block(&mut self, block: &[u8]) -> Result<()> {
        let key = block_key(self.next_block);
        let inode = &self.inode;

        self.db.batch(|tx| {
            let ns = inode
                .resolve(&*tx)?
                .ok_or_else(|| FsError::NotFound(format!("inode {}", inode)))?;
            tx.put(&ns, &key, block)
        })?;

        tracing::debug!(inode = %self.inode, block = self.next_block, len = block.len(), "block written");
        self.next_block += 1;
        self.bytes_written += block.len() as u64;
        Ok(())
    }
}
