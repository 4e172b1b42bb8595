//! Error types for AtlasFS
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using FsError
pub type Result<T> = std::result::Result<T, FsError>;

/// Unified error type for AtlasFS operations
#[derive(Debug, Error)]
pub enum FsError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Filesystem Errors
    // -------------------------------------------------------------------------
    #[error("open {0}: file not found")]
    NotFound(String),

    #[error("{0}: is a directory")]
    IsDirectory(String),

    #[error("{0}: is a file")]
    IsFile(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Existing fs version mismatch {found}!={expected}")]
    VersionMismatch { found: u64, expected: u64 },

    #[error("Malformed fs version marker ({len} bytes)")]
    MalformedVersion { len: usize },

    #[error("File is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Storage Errors (engine)
    // -------------------------------------------------------------------------
    #[error("Key already exists")]
    KeyExists,

    #[error("Key not found")]
    KeyNotFound,

    #[error("Incompatible value: {0}")]
    IncompatibleValue(String),

    #[error("Transaction is read-only")]
    ReadOnly,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FsError {
    /// True for failures reported by the key-value engine itself
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            FsError::Io(_)
                | FsError::KeyExists
                | FsError::KeyNotFound
                | FsError::IncompatibleValue(_)
                | FsError::ReadOnly
                | FsError::Storage(_)
                | FsError::WalCorruption(_)
        )
    }
}

impl From<bincode::Error> for FsError {
    fn from(e: bincode::Error) -> Self {
        FsError::Serialization(e.to_string())
    }
}

impl From<FsError> for std::io::Error {
    fn from(e: FsError) -> Self {
        use std::io::ErrorKind;

        let kind = match &e {
            FsError::Io(inner) => inner.kind(),
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::InvalidArgument(_) => ErrorKind::InvalidInput,
            FsError::Closed => ErrorKind::BrokenPipe,
            FsError::Corrupt(_) | FsError::Serialization(_) => ErrorKind::InvalidData,
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}
