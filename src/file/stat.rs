//! Stat records
//!
//! The metadata entry stored under a file's name in its directory namespace.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{FsError, Result};
use crate::path::BucketPath;

/// Metadata of one file version, or of a directory
///
/// Records are written once when a file is closed and replaced wholesale on
/// overwrite; they are never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Last path component
    pub name: String,

    pub is_dir: bool,

    /// Content length in bytes
    pub len: u64,

    /// Block size the content was written with
    pub block_size: u64,

    /// Namespace holding the blocks; `None` for directories
    pub inode: Option<BucketPath>,

    /// Modification time (unix millis)
    pub modified_ms: u64,
}

impl FileStat {
    /// Record for a regular file, stamped with the current time
    pub fn file(name: impl Into<String>, len: u64, block_size: u64, inode: BucketPath) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            len,
            block_size,
            inode: Some(inode),
            modified_ms: now_millis(),
        }
    }

    /// Synthetic record for an implicit directory
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            len: 0,
            block_size: 0,
            inode: None,
            modified_ms: 0,
        }
    }

    /// Size as reported to listings: 0 for directories
    pub fn size(&self) -> u64 {
        if self.is_dir {
            0
        } else {
            self.len
        }
    }

    pub fn modified(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.modified_ms)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| FsError::Corrupt(format!("stat record: {}", e)))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
