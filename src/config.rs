//! Configuration for AtlasFS
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for an AtlasFS store and the filesystem on top of it
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the write-ahead log.
    /// `None` keeps the whole store in memory.
    /// Internal structure:
    ///   {data_dir}/
    ///     └── atlasfs.wal      (write-ahead log)
    pub data_dir: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Filesystem Configuration
    // -------------------------------------------------------------------------
    /// Size of every stored block except possibly the last one of a file
    pub block_size: u64,

    /// Name of the top-level bucket holding the filesystem
    pub root_bucket: Vec<u8>,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            block_size: 32 * 1024, // 32 KB
            root_bucket: b"atlasfs".to_vec(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (enables the write-ahead log)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the block size (in bytes)
    pub fn block_size(mut self, size: u64) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the name of the filesystem's root bucket
    pub fn root_bucket(mut self, name: impl Into<Vec<u8>>) -> Self {
        self.config.root_bucket = name.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
