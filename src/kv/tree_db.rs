//! Tree Database
//!
//! The bundled engine: an ordered tree of nested namespaces with snapshot
//! readers, a single serialized writer and an optional write-ahead log.
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
//!
//! - **Writes**: `begin(true)` waits on the writer gate, so only ONE write
//!   transaction exists at a time. It mutates a private copy-on-write root and
//!   publishes it on commit.
//! - **Reads**: `begin(false)` clones the current root `Arc`. The snapshot
//!   never changes, no matter how many writers commit afterwards.
//!
//! ## Durability
//! With a data directory, commit appends the transaction's operations to the
//! WAL before publishing the new root. `batch` appends with deferred sync so
//! bursts of small commits share one fsync.

use std::fs;
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::config::Config;
use crate::error::{FsError, Result};
use crate::wal::{Durability, Operation, WalRecovery, WalWriter};

use super::node::{self, Entry, Node};
use super::{Cursor, Database, Lookup, Slot, Transaction};

/// Handle to the bundled engine
///
/// Cloning is cheap; all clones share one store.
#[derive(Clone)]
pub struct TreeDb {
    shared: Arc<Shared>,
}

struct Shared {
    /// Last committed root
    root: RwLock<Arc<Node>>,

    /// Serializes write transactions
    writer: WriterGate,

    /// Present when the store is durable
    wal: Option<Mutex<WalWriter>>,
}

impl TreeDb {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "atlasfs.wal";

    /// Create a store that lives only in memory
    pub fn in_memory() -> Self {
        Self::from_parts(Arc::new(Node::default()), None)
    }

    /// Open or create a store with the given config
    ///
    /// Without `data_dir` this is [`TreeDb::in_memory`]. Otherwise:
    /// 1. Create the data directory if needed
    /// 2. Recover the WAL, truncating a torn tail
    /// 3. Replay every recovered entry into a fresh tree
    /// 4. Reopen the WAL for appending after the last LSN
    pub fn open(config: &Config) -> Result<Self> {
        let Some(data_dir) = config.data_dir.as_ref() else {
            return Ok(Self::in_memory());
        };

        fs::create_dir_all(data_dir)?;
        let wal_path = data_dir.join(Self::WAL_FILENAME);

        let mut root = Arc::new(Node::default());
        let mut next_lsn = 1;

        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;

            for entry in &entries {
                for op in &entry.operations {
                    node::apply(&mut root, op).map_err(|e| {
                        FsError::WalCorruption(format!("replaying lsn {}: {}", entry.lsn, e))
                    })?;
                }
            }

            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    result.entries_recovered,
                    result.entries_corrupted,
                    result.last_lsn
                );
            }
            next_lsn = result.last_lsn + 1;
        }

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy, next_lsn)?;
        Ok(Self::from_parts(root, Some(wal)))
    }

    fn from_parts(root: Arc<Node>, wal: Option<WalWriter>) -> Self {
        Self {
            shared: Arc::new(Shared {
                root: RwLock::new(root),
                writer: WriterGate::default(),
                wal: wal.map(Mutex::new),
            }),
        }
    }

    /// Force every committed transaction to disk
    pub fn sync(&self) -> Result<()> {
        match &self.shared.wal {
            Some(wal) => wal.lock().sync(),
            None => Ok(()),
        }
    }

    /// Whether commits are written to a WAL
    pub fn is_durable(&self) -> bool {
        self.shared.wal.is_some()
    }

    fn begin_with(&self, writable: bool, durability: Durability) -> TreeTx {
        if writable {
            self.shared.writer.acquire();
        }
        let root = Arc::clone(&self.shared.root.read());

        tracing::trace!(writable, "begin transaction");
        TreeTx {
            shared: Arc::clone(&self.shared),
            root,
            writable,
            durability,
            log: Vec::new(),
        }
    }
}

impl Database for TreeDb {
    type Tx = TreeTx;

    fn begin(&self, writable: bool) -> Result<TreeTx> {
        Ok(self.begin_with(writable, Durability::Immediate))
    }

    fn batch<T>(&self, f: impl FnOnce(&mut TreeTx) -> Result<T>) -> Result<T> {
        let mut tx = self.begin_with(true, Durability::Deferred);
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }
}

// =============================================================================
// Writer Gate
// =============================================================================

/// Owned exclusive-writer flag (a lock that is not tied to a guard lifetime)
#[derive(Default)]
struct WriterGate {
    busy: Mutex<bool>,
    released: Condvar,
}

impl WriterGate {
    fn acquire(&self) {
        let mut busy = self.busy.lock();
        while *busy {
            self.released.wait(&mut busy);
        }
        *busy = true;
    }

    fn release(&self) {
        *self.busy.lock() = false;
        self.released.notify_one();
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Namespace handle inside a [`TreeTx`]: the chain of keys from the root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNamespace {
    keys: Vec<Vec<u8>>,
}

impl TreeNamespace {
    fn child(&self, key: &[u8]) -> Self {
        Self {
            keys: self.path_to(key),
        }
    }

    fn path_to(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        keys.extend(self.keys.iter().cloned());
        keys.push(key.to_vec());
        keys
    }

    /// Number of keys between the root and this namespace
    pub fn depth(&self) -> usize {
        self.keys.len()
    }
}

/// Transaction over a [`TreeDb`]
///
/// Dropping an uncommitted write transaction rolls it back.
pub struct TreeTx {
    shared: Arc<Shared>,
    root: Arc<Node>,
    writable: bool,
    durability: Durability,
    /// Operations to append to the WAL on commit
    log: Vec<Operation>,
}

impl TreeTx {
    fn node(&self, ns: &TreeNamespace) -> Result<&Arc<Node>> {
        node::descend(&self.root, &ns.keys).ok_or(FsError::KeyNotFound)
    }

    fn mutate(&mut self, op: Operation) -> Result<()> {
        if !self.writable {
            return Err(FsError::ReadOnly);
        }
        node::apply(&mut self.root, &op)?;
        if self.shared.wal.is_some() {
            self.log.push(op);
        }
        Ok(())
    }
}

impl Transaction for TreeTx {
    type Namespace = TreeNamespace;
    type Cursor = TreeCursor;

    fn root(&self) -> TreeNamespace {
        TreeNamespace::default()
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn lookup(&self, ns: &TreeNamespace, key: &[u8]) -> Result<Lookup<TreeNamespace>> {
        let node = self.node(ns)?;
        Ok(match node.entries.get(key) {
            None => Lookup::Absent,
            Some(Entry::Value(value)) => Lookup::Value(value.clone()),
            Some(Entry::Bucket(_)) => Lookup::Namespace(ns.child(key)),
        })
    }

    fn create(&mut self, ns: &TreeNamespace, key: &[u8]) -> Result<TreeNamespace> {
        self.mutate(Operation::CreateBucket { path: ns.path_to(key) })?;
        Ok(ns.child(key))
    }

    fn create_if_absent(&mut self, ns: &TreeNamespace, key: &[u8]) -> Result<TreeNamespace> {
        if !self.writable {
            return Err(FsError::ReadOnly);
        }
        match self.lookup(ns, key)? {
            Lookup::Namespace(child) => Ok(child),
            Lookup::Value(_) => Err(FsError::IncompatibleValue(format!(
                "key {:?} holds a value",
                String::from_utf8_lossy(key)
            ))),
            Lookup::Absent => self.create(ns, key),
        }
    }

    fn delete(&mut self, ns: &TreeNamespace, key: &[u8]) -> Result<()> {
        self.mutate(Operation::DeleteBucket { path: ns.path_to(key) })
    }

    fn put(&mut self, ns: &TreeNamespace, key: &[u8], value: &[u8]) -> Result<()> {
        self.mutate(Operation::Put {
            path: ns.path_to(key),
            value: value.to_vec(),
        })
    }

    fn cursor(&self, ns: &TreeNamespace) -> Result<TreeCursor> {
        let node = self.node(ns)?;
        Ok(TreeCursor::new(Arc::clone(node)))
    }

    fn commit(mut self) -> Result<()> {
        if !self.writable {
            return Ok(());
        }

        if !self.log.is_empty() {
            if let Some(wal) = &self.shared.wal {
                let lsn = wal
                    .lock()
                    .append(std::mem::take(&mut self.log), self.durability)?;
                tracing::trace!(lsn, "transaction logged");
            }
        }

        *self.shared.root.write() = Arc::clone(&self.root);
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        Ok(())
    }
}

impl Drop for TreeTx {
    fn drop(&mut self) {
        if self.writable {
            self.shared.writer.release();
        }
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Cursor over a snapshot of one namespace
///
/// Mutations made after the cursor was opened are not visible through it.
pub struct TreeCursor {
    node: Arc<Node>,
    /// Key the cursor is on; `None` before `first` and after the end
    position: Option<Vec<u8>>,
}

impl TreeCursor {
    fn new(node: Arc<Node>) -> Self {
        Self { node, position: None }
    }

    fn settle(&mut self, found: Option<(Vec<u8>, Slot)>) -> Option<(Bytes, Slot)> {
        match found {
            Some((key, slot)) => {
                let out = Bytes::copy_from_slice(&key);
                self.position = Some(key);
                Some((out, slot))
            }
            None => {
                self.position = None;
                None
            }
        }
    }

    fn entry_at(&self, lower: Bound<&[u8]>) -> Option<(Vec<u8>, Slot)> {
        self.node
            .entries
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(key, entry)| {
                let slot = match entry {
                    Entry::Value(value) => Slot::Value(value.clone()),
                    Entry::Bucket(_) => Slot::Namespace,
                };
                (key.clone(), slot)
            })
    }
}

impl Cursor for TreeCursor {
    fn first(&mut self) -> Option<(Bytes, Slot)> {
        let found = self.entry_at(Bound::Unbounded);
        self.settle(found)
    }

    fn next(&mut self) -> Option<(Bytes, Slot)> {
        let found = match &self.position {
            Some(current) => self.entry_at(Bound::Excluded(current.as_slice())),
            None => None,
        };
        self.settle(found)
    }

    fn seek(&mut self, key: &[u8]) -> Option<(Bytes, Slot)> {
        let found = self.entry_at(Bound::Included(key));
        self.settle(found)
    }
}
