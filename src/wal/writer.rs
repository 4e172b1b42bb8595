//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{FsError, Result};

use super::{Operation, WalEntry};

/// How hard an append pushes the entry to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Honour the configured sync strategy
    Immediate,

    /// Leave the entry buffered; the next immediate append or the strategy
    /// threshold makes it durable, together with everything before it
    Deferred,
}

/// Writes entries to the WAL file
///
/// Every append reaches the OS before it returns; only the fsync is subject
/// to the sync strategy. A failed append is cut back out of the file, so an
/// entry whose commit reported an error is never replayed.
pub struct WalWriter {
    path: PathBuf,
    /// `None` once a failed append could not be removed again
    file: Option<BufWriter<File>>,
    /// Length of the file up to the end of the last successful append
    len: u64,
    /// LSN assigned to the next appended entry
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries written since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file, continuing from `next_lsn`
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(BufWriter::new(file)),
            len,
            current_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append an entry for `operations`, returning its LSN
    ///
    /// On error the entry is not in the log and the LSN is not consumed.
    pub fn append(&mut self, operations: Vec<Operation>, durability: Durability) -> Result<u64> {
        let lsn = self.current_lsn;
        let frame = WalEntry::new(lsn, operations).encode()?;

        if let Err(e) = self.write_frame(&frame, durability) {
            self.discard_tail();
            return Err(e);
        }

        self.len += frame.len() as u64;
        self.current_lsn += 1;
        tracing::trace!(lsn, bytes = frame.len(), ?durability, "WAL append");
        Ok(lsn)
    }

    fn write_frame(&mut self, frame: &[u8], durability: Durability) -> Result<()> {
        let due = match (durability, self.sync_strategy) {
            (Durability::Immediate, WalSyncStrategy::EveryWrite) => true,
            (_, WalSyncStrategy::EveryNEntries { count }) => self.unsynced + 1 >= count.max(1),
            (Durability::Deferred, WalSyncStrategy::EveryWrite) => false,
        };

        let file = self.file_mut()?;
        file.write_all(frame)?;
        file.flush()?;
        if due {
            file.get_ref().sync_data()?;
            self.unsynced = 0;
        } else {
            self.unsynced += 1;
        }
        Ok(())
    }

    /// Cut the file back to the end of the last successful append, dropping
    /// anything the failed one left buffered
    fn discard_tail(&mut self) {
        let Some(stale) = self.file.take() else {
            return;
        };
        let (file, _unwritten) = stale.into_parts();

        match file.set_len(self.len) {
            Ok(()) => self.file = Some(BufWriter::new(file)),
            Err(e) => tracing::warn!(
                "could not remove failed WAL append, refusing further writes: {}",
                e
            ),
        }
    }

    fn file_mut(&mut self) -> Result<&mut BufWriter<File>> {
        self.file.as_mut().ok_or_else(|| {
            FsError::Storage(format!(
                "WAL {} is unusable after a failed append",
                self.path.display()
            ))
        })
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.flush()?;
        file.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the LSN the next entry will receive
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Number of appended entries not yet fsynced
    pub fn unsynced(&self) -> usize {
        self.unsynced
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of the log covered by successful appends
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether a failed append left the log in a state it could not repair
    pub fn is_poisoned(&self) -> bool {
        self.file.is_none()
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if self.unsynced > 0 && self.file.is_some() {
            if let Err(e) = self.sync() {
                tracing::warn!("WAL sync on drop failed: {}", e);
            }
        }
    }
}
