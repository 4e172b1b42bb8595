//! Readable files
//!
//! A readable file pins one read-only transaction for its whole lifetime, so
//! every read, seek and listing sees the same snapshot regardless of writers
//! committing in the meantime.

use std::io;

use crate::block::{seek_args, BlockReader, ReadOutcome, Whence};
use crate::error::{FsError, Result};
use crate::kv::{Cursor, Database, Slot, Transaction};

use super::FileStat;

type TxCursor<D> = <<D as Database>::Tx as Transaction>::Cursor;

/// What an opened name turned out to be
enum Handle<C> {
    /// Implicit directory; listing walks its namespace
    Directory(DirCursor<C>),
    /// Regular file; reads walk its inode
    Regular(BlockReader<C>),
}

/// Resumable walk over a directory namespace
struct DirCursor<C> {
    cursor: C,
    started: bool,
    exhausted: bool,
}

impl<C: Cursor> DirCursor<C> {
    fn advance(&mut self) -> Option<(bytes::Bytes, Slot)> {
        if self.exhausted {
            return None;
        }
        let entry = if self.started {
            self.cursor.next()
        } else {
            self.started = true;
            self.cursor.first()
        };
        if entry.is_none() {
            self.exhausted = true;
        }
        entry
    }
}

/// Read-only handle returned by [`crate::FileSystem::open`]
pub struct ReadableFile<D: Database> {
    /// Snapshot transaction; `None` once closed
    tx: Option<D::Tx>,
    stat: FileStat,
    handle: Handle<TxCursor<D>>,
}

impl<D: Database> ReadableFile<D> {
    pub(crate) fn regular(tx: D::Tx, stat: FileStat, reader: BlockReader<TxCursor<D>>) -> Self {
        Self {
            tx: Some(tx),
            stat,
            handle: Handle::Regular(reader),
        }
    }

    pub(crate) fn directory(tx: D::Tx, stat: FileStat, cursor: TxCursor<D>) -> Self {
        Self {
            tx: Some(tx),
            stat,
            handle: Handle::Directory(DirCursor {
                cursor,
                started: false,
                exhausted: false,
            }),
        }
    }

    /// Read up to `buf.len()` bytes; `eof` is reported with the last bytes
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        self.ensure_open()?;
        match &mut self.handle {
            Handle::Regular(reader) => reader.read_chunk(buf),
            Handle::Directory(_) => Err(FsError::IsDirectory(self.stat.name.clone())),
        }
    }

    /// Move the read position; see [`BlockReader::seek`]
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.ensure_open()?;
        match &mut self.handle {
            Handle::Regular(reader) => reader.seek(offset, whence),
            Handle::Directory(_) => Err(FsError::IsDirectory(self.stat.name.clone())),
        }
    }

    /// List up to `limit` further entries (`0` lists all remaining)
    ///
    /// Listing resumes where the previous call stopped. Child namespaces are
    /// reported as directories; stored values decode to stat records.
    pub fn read_dir(&mut self, limit: usize) -> Result<Vec<FileStat>> {
        self.ensure_open()?;
        let dir = match &mut self.handle {
            Handle::Directory(dir) => dir,
            Handle::Regular(_) => return Err(FsError::IsFile(self.stat.name.clone())),
        };

        let mut entries = Vec::new();
        while limit == 0 || entries.len() < limit {
            let Some((key, slot)) = dir.advance() else {
                break;
            };
            let stat = match slot {
                Slot::Namespace => FileStat::directory(String::from_utf8_lossy(&key)),
                Slot::Value(data) => FileStat::decode(&data)?,
            };
            entries.push(stat);
        }
        Ok(entries)
    }

    /// Metadata of the opened file or directory
    pub fn stat(&self) -> &FileStat {
        &self.stat
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.handle, Handle::Directory(_))
    }

    /// Release the snapshot
    pub fn close(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(FsError::Closed)?;
        tx.commit()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.tx.is_none() {
            return Err(FsError::Closed);
        }
        Ok(())
    }
}

impl<D: Database> io::Read for ReadableFile<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_chunk(buf)?.len)
    }
}

impl<D: Database> io::Seek for ReadableFile<D> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = seek_args(pos)?;
        Ok(ReadableFile::seek(self, offset, whence)?)
    }
}
