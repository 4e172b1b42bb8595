//! # AtlasFS
//!
//! A seekable, hierarchical file store inside an embedded key-value store:
//! - Nested namespaces ("buckets") with ACID transactions
//! - Files chunked into fixed-size blocks, one transaction per block
//! - Stat records published atomically on close, with orphan cleanup
//! - Snapshot-consistent readers with random access
//! - Write-Ahead Logging (WAL) for durability of the bundled engine
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       FileSystem                             │
//! │             create(path) / open(path) / inodes               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │WritableFile │          │ReadableFile │
//!   │ChunkedWriter│          │ BlockReader │
//!   │ BlockWriter │          │ (snapshot)  │
//!   └──────┬──────┘          └──────┬──────┘
//!          │      BucketPath        │
//!          └────────────┬───────────┘
//!                       ▼
//!             ┌───────────────────┐
//!             │  kv::Database     │
//!             │  (TreeDb + WAL)   │
//!             └───────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod kv;
pub mod path;
pub mod block;
pub mod file;
pub mod fs;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FsError, Result};
pub use config::{Config, WalSyncStrategy};
pub use kv::{Database, TreeDb};
pub use path::BucketPath;
pub use block::{ReadOutcome, Whence};
pub use file::{FileStat, ReadableFile, WritableFile};
pub use fs::{FileSystem, FS_VERSION};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasFS
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
