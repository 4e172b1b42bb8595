//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{FsError, Result};

/// Frame header size: LSN (8) + CRC (4) + Len (4) = 16 bytes
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL: every mutation of one committed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Mutations in the order the transaction applied them
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Mutations that can be logged
///
/// Every path is the full chain of keys from the store root, ending with the
/// key the operation targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Create an empty namespace
    CreateBucket { path: Vec<Vec<u8>> },

    /// Delete a namespace and everything below it
    DeleteBucket { path: Vec<Vec<u8>> },

    /// Store a value
    Put { path: Vec<Vec<u8>>, value: Vec<u8> },
}

impl WalEntry {
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { lsn, operations, timestamp }
    }

    /// Encode as a complete frame (header + data)
    pub fn encode(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        let len = u32::try_from(data.len())
            .map_err(|_| FsError::Serialization(format!("WAL entry too large: {} bytes", data.len())))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Decode the data section of a frame whose header has already been read
    pub fn decode(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(data);
        if actual != crc {
            return Err(FsError::WalCorruption(format!(
                "CRC mismatch at lsn {}: stored {:#010x}, computed {:#010x}",
                lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| FsError::WalCorruption(format!("undecodable entry at lsn {}: {}", lsn, e)))?;
        if entry.lsn != lsn {
            return Err(FsError::WalCorruption(format!(
                "LSN mismatch: header {}, entry {}",
                lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}
