//! Writable files
//!
//! Write path of one file version:
//! 1. Blocks stream into a freshly allocated inode (one transaction each)
//! 2. `close` flushes the final short block
//! 3. One transaction publishes the stat record and drops a superseded inode
//!
//! Any failure along the way deletes the new inode, so a stat record never
//! points at missing data and no inode outlives an unpublished record.

use std::io;

use crate::block::{BlockWriter, ChunkedWriter};
use crate::error::{FsError, Result};
use crate::kv::{Database, Lookup, Transaction};
use crate::path::BucketPath;

use super::FileStat;

/// Write-only handle returned by [`crate::FileSystem::create`]
///
/// Nothing becomes visible under the file's name until [`WritableFile::close`]
/// succeeds. Dropping an unclosed file discards what was written.
pub struct WritableFile<D: Database> {
    db: D,
    /// Name as passed to `create`, for messages
    name: String,
    /// Directory namespace receiving the stat record
    dir: BucketPath,
    /// Key of the stat record inside `dir`
    leaf: String,
    /// Inode receiving this version's blocks
    inode: BucketPath,
    block_size: u64,
    /// `None` once closed
    writer: Option<ChunkedWriter<BlockWriter<D>>>,
    len: u64,
}

impl<D: Database> WritableFile<D> {
    pub(crate) fn new(
        db: D,
        name: impl Into<String>,
        dir: BucketPath,
        leaf: impl Into<String>,
        inode: BucketPath,
        block_size: u64,
    ) -> Self {
        let writer = ChunkedWriter::new(
            BlockWriter::new(db.clone(), inode.clone()),
            block_size as usize,
        );
        Self {
            db,
            name: name.into(),
            dir,
            leaf: leaf.into(),
            inode,
            block_size,
            writer: Some(writer),
            len: 0,
        }
    }

    /// Append `data`, returning how many bytes were accepted
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or(FsError::Closed)?;
        let n = writer.write(data)?;
        self.len += n as u64;
        Ok(n)
    }

    /// Flush the last block and publish the file
    ///
    /// On failure the new inode is deleted and the file stays absent (or keeps
    /// its previous version). A file can be closed once.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Err(FsError::Closed);
        };

        if let Err(e) = writer.close() {
            self.wipe_inode();
            return Err(e);
        }

        let stat = FileStat::file(self.leaf.clone(), self.len, self.block_size, self.inode.clone());
        if let Err(e) = self.publish(&stat) {
            self.wipe_inode();
            return Err(e);
        }

        tracing::debug!(
            file = %self.name,
            inode = %self.inode,
            len = self.len,
            blocks = writer.sink().blocks(),
            "file published"
        );
        Ok(())
    }

    fn publish(&self, stat: &FileStat) -> Result<()> {
        let data = stat.encode()?;

        self.db.update(|tx| {
            let dir = self.dir.ensure(tx)?;

            if let Lookup::Value(old) = tx.lookup(&dir, self.leaf.as_bytes())? {
                self.supersede(tx, &old);
            }

            tx.put(&dir, self.leaf.as_bytes(), &data)
        })
    }

    /// Delete the inode of the version being replaced, if it is a different one
    fn supersede(&self, tx: &mut D::Tx, old_record: &[u8]) {
        let old_inode = match FileStat::decode(old_record) {
            Ok(FileStat { inode: Some(inode), .. }) => inode,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(file = %self.name, "unreadable previous stat record: {}", e);
                return;
            }
        };
        if old_inode == self.inode {
            return;
        }

        match old_inode.delete(tx) {
            Ok(()) => tracing::debug!(file = %self.name, inode = %old_inode, "superseded inode deleted"),
            Err(e) => tracing::warn!(file = %self.name, inode = %old_inode, "could not delete superseded inode: {}", e),
        }
    }

    /// Best-effort removal of this version's inode
    fn wipe_inode(&self) {
        let result = self.db.update(|tx| self.inode.delete(tx));
        if let Err(e) = result {
            tracing::warn!(file = %self.name, inode = %self.inode, "orphaned inode cleanup failed: {}", e);
        }
    }

    /// Bytes accepted so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inode receiving this version's blocks
    pub fn inode(&self) -> &BucketPath {
        &self.inode
    }
}

impl<D: Database> io::Write for WritableFile<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(WritableFile::write(self, buf)?)
    }

    /// Partial blocks are only emitted by `close`, so there is nothing to do
    fn flush(&mut self) -> io::Result<()> {
        if self.writer.is_none() {
            return Err(FsError::Closed.into());
        }
        Ok(())
    }
}

impl<D: Database> Drop for WritableFile<D> {
    fn drop(&mut self) {
        if self.writer.is_some() {
            tracing::debug!(file = %self.name, "dropped without close, discarding inode");
            self.wipe_inode();
        }
    }
}
