//! Key-Value Capability Module
//!
//! The minimal transactional contract the filesystem is written against,
//! plus the bundled engine that satisfies it.
//!
//! ## Responsibilities
//! - Nested namespaces ("buckets") that hold both values and child buckets
//! - Ordered cursors over a namespace's key range
//! - ACID transactions (`begin` / `update` / `batch` / `view`)
//!
//! ## Lookup Model
//! ```text
//! namespace
//! ├── key_a  →  Value(bytes)
//! ├── key_b  →  Namespace ──┬── key_c → Value(bytes)
//! │                         └── ...
//! └── key_d  →  (absent)
//! ```
//! A key resolves to exactly one of absent / value / namespace. The three
//! cases are spelled out by [`Lookup`] and [`Slot`] instead of a nullable
//! return, so a stored empty value is never mistaken for a namespace.

mod node;
mod tree_db;

use bytes::Bytes;

use crate::error::Result;

pub use tree_db::{TreeCursor, TreeDb, TreeNamespace, TreeTx};

// =============================================================================
// Tagged lookup results
// =============================================================================

/// Result of resolving one key inside a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<N> {
    /// Nothing stored under the key
    Absent,

    /// A stored value
    Value(Bytes),

    /// A child namespace
    Namespace(N),
}

/// What a cursor found at its current key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// A stored value
    Value(Bytes),

    /// A child namespace (not opened by the cursor)
    Namespace,
}

// =============================================================================
// Capability traits
// =============================================================================

/// Ordered, stateful iterator over one namespace's keys
///
/// Every positioning call returns the entry it landed on, or `None` once the
/// range is exhausted.
pub trait Cursor {
    /// Move to the first key
    fn first(&mut self) -> Option<(Bytes, Slot)>;

    /// Move to the key after the current one
    fn next(&mut self) -> Option<(Bytes, Slot)>;

    /// Move to the first key greater than or equal to `key`
    fn seek(&mut self, key: &[u8]) -> Option<(Bytes, Slot)>;
}

/// A read-only or read-write transaction
///
/// Namespace handles are only meaningful inside the transaction that produced
/// them.
pub trait Transaction {
    /// Handle to a namespace within this transaction
    type Namespace: Clone;

    /// Cursor type returned by [`Transaction::cursor`]
    type Cursor: Cursor;

    /// The top-level namespace
    fn root(&self) -> Self::Namespace;

    /// Whether mutations are allowed
    fn is_writable(&self) -> bool;

    /// Resolve a key inside `ns`
    fn lookup(&self, ns: &Self::Namespace, key: &[u8]) -> Result<Lookup<Self::Namespace>>;

    /// Child namespace under `key`, if there is one
    fn child(&self, ns: &Self::Namespace, key: &[u8]) -> Result<Option<Self::Namespace>> {
        match self.lookup(ns, key)? {
            Lookup::Namespace(child) => Ok(Some(child)),
            _ => Ok(None),
        }
    }

    /// Stored value under `key`, if there is one
    fn get(&self, ns: &Self::Namespace, key: &[u8]) -> Result<Option<Bytes>> {
        match self.lookup(ns, key)? {
            Lookup::Value(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Create a child namespace; fails if the key is already taken
    fn create(&mut self, ns: &Self::Namespace, key: &[u8]) -> Result<Self::Namespace>;

    /// Return the child namespace under `key`, creating it when absent
    fn create_if_absent(&mut self, ns: &Self::Namespace, key: &[u8]) -> Result<Self::Namespace>;

    /// Delete the child namespace under `key` together with its contents
    fn delete(&mut self, ns: &Self::Namespace, key: &[u8]) -> Result<()>;

    /// Store a value under `key`
    fn put(&mut self, ns: &Self::Namespace, key: &[u8], value: &[u8]) -> Result<()>;

    /// Open a cursor over `ns`
    fn cursor(&self, ns: &Self::Namespace) -> Result<Self::Cursor>;

    /// Make all mutations visible atomically
    fn commit(self) -> Result<()>;

    /// Discard all mutations
    fn rollback(self) -> Result<()>;
}

/// An embedded database handing out transactions
///
/// Handles are cheap to clone and share the same underlying store.
pub trait Database: Clone {
    type Tx: Transaction;

    /// Start a transaction
    fn begin(&self, writable: bool) -> Result<Self::Tx>;

    /// Run `f` in a read-write transaction, committing on success
    fn update<T>(&self, f: impl FnOnce(&mut Self::Tx) -> Result<T>) -> Result<T> {
        let mut tx = self.begin(true)?;
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("rollback after failed update: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Like [`Database::update`], but lets the engine coalesce commits
    fn batch<T>(&self, f: impl FnOnce(&mut Self::Tx) -> Result<T>) -> Result<T> {
        self.update(f)
    }

    /// Run `f` in a read-only transaction
    fn view<T>(&self, f: impl FnOnce(&Self::Tx) -> Result<T>) -> Result<T> {
        let tx = self.begin(false)?;
        let result = f(&tx);
        tx.rollback()?;
        result
    }
}
