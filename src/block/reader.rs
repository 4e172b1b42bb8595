//! Block Reader
//!
//! Seekable byte source over an inode's blocks.

use std::io;

use bytes::{Buf, Bytes};

use crate::error::{FsError, Result};
use crate::kv::{Cursor, Slot};

use super::{block_index, block_key};

/// Reference point for [`BlockReader::seek`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute offset
    Start = 0,
    /// Relative to the current position
    Current = 1,
    /// Relative to the end of the data
    End = 2,
}

impl TryFrom<i32> for Whence {
    type Error = FsError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            other => Err(FsError::InvalidArgument(format!(
                "expected whence to be 0, 1, or 2, got {}",
                other
            ))),
        }
    }
}

/// Result of one read call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Bytes copied into the caller's buffer
    pub len: usize,
    /// The read reached the last byte; reported together with the final bytes
    pub eof: bool,
}

/// Reads a file's contents by walking an ordered cursor over its blocks
pub struct BlockReader<C> {
    cursor: C,
    block_size: u64,
    len: u64,
    /// Logical offset, always within `0..=len`
    pos: u64,
    /// Unread remainder of the block the cursor is on
    current: Bytes,
}

impl<C: Cursor> BlockReader<C> {
    /// Position a reader at offset 0 of a `len`-byte inode
    pub fn new(cursor: C, block_size: u64, len: u64) -> Result<Self> {
        if block_size == 0 {
            return Err(FsError::InvalidArgument("block size must be positive".to_string()));
        }
        let mut reader = Self {
            cursor,
            block_size,
            len,
            pos: 0,
            current: Bytes::new(),
        };
        reader.current = reader.load_block(0)?.unwrap_or_default();
        Ok(reader)
    }

    /// Move to a new offset, returning it
    ///
    /// Targets outside `0..=len` are rejected and leave the position unchanged.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.pos as i64,
            Whence::End => self.len as i64,
        };
        let target = base
            .checked_add(offset)
            .filter(|t| *t >= 0 && (*t as u64) <= self.len)
            .ok_or_else(|| {
                FsError::InvalidArgument("new position is beyond contents of file".to_string())
            })? as u64;

        let index = target / self.block_size;
        let current = match self.load_block(index)? {
            Some(block) => block,
            // Only a seek to the very end may land past the last block
            None if target == self.len => Bytes::new(),
            None => return Err(FsError::Corrupt(format!("missing block {}", index))),
        };

        let skip = ((target % self.block_size) as usize).min(current.len());
        self.current = current.slice(skip..);
        self.pos = target;
        Ok(target)
    }

    /// Copy up to `buf.len()` bytes, crossing block boundaries as needed
    ///
    /// When the copy ends on the last byte, `eof` is set in the same call.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        if self.pos == self.len {
            return Ok(ReadOutcome { len: 0, eof: true });
        }

        let mut filled = 0;
        while filled < buf.len() && self.pos < self.len {
            if self.current.is_empty() {
                // The block holding `pos` must reach past it
                let skip = (self.pos % self.block_size) as usize;
                match self.load_block(self.pos / self.block_size)? {
                    Some(block) if skip < block.len() => {
                        self.current = block.slice(skip..);
                        continue;
                    }
                    _ if filled > 0 => break,
                    _ => {
                        return Err(FsError::Corrupt(format!(
                            "inode ends at offset {} of {}",
                            self.pos, self.len
                        )))
                    }
                }
            }

            let remaining = (self.len - self.pos) as usize;
            let n = (buf.len() - filled).min(self.current.len()).min(remaining);
            buf[filled..filled + n].copy_from_slice(&self.current[..n]);
            self.current.advance(n);
            self.pos += n as u64;
            filled += n;
        }

        Ok(ReadOutcome {
            len: filled,
            eof: self.pos == self.len,
        })
    }

    /// Position the cursor on block `index`
    ///
    /// Block keys are little-endian, so byte order and block order diverge
    /// past block 255; every block is looked up by key rather than reached
    /// with `next`.
    fn load_block(&mut self, index: u64) -> Result<Option<Bytes>> {
        match self.cursor.seek(&block_key(index)) {
            Some((key, slot)) if block_index(&key) == Some(index) => payload(Some((key, slot))),
            _ => Ok(None),
        }
    }

    /// Current logical offset
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<C: Cursor> io::Read for BlockReader<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_chunk(buf)?.len)
    }
}

impl<C: Cursor> io::Seek for BlockReader<C> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = seek_args(pos)?;
        Ok(BlockReader::seek(self, offset, whence)?)
    }
}

/// Split a `SeekFrom` into offset and whence
pub(crate) fn seek_args(pos: io::SeekFrom) -> Result<(i64, Whence)> {
    Ok(match pos {
        io::SeekFrom::Start(offset) => {
            let offset = i64::try_from(offset)
                .map_err(|_| FsError::InvalidArgument("offset out of range".to_string()))?;
            (offset, Whence::Start)
        }
        io::SeekFrom::Current(offset) => (offset, Whence::Current),
        io::SeekFrom::End(offset) => (offset, Whence::End),
    })
}

fn payload(entry: Option<(Bytes, Slot)>) -> Result<Option<Bytes>> {
    match entry {
        None => Ok(None),
        Some((_, Slot::Value(block))) => Ok(Some(block)),
        Some((key, Slot::Namespace)) => Err(FsError::Corrupt(format!(
            "namespace instead of block at key {:?}",
            key
        ))),
    }
}
