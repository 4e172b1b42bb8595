//! Bucket Path Addressing
//!
//! A `BucketPath` names a namespace by the chain of keys leading to it from
//! a transaction's root. Paths are plain data: they are resolved afresh inside
//! every transaction instead of holding on to namespace handles, which only
//! live as long as the transaction that produced them.

use serde::{Deserialize, Serialize};

use crate::error::{FsError, Result};
use crate::kv::{Lookup, Transaction};

/// Ordered sequence of opaque byte segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketPath(Vec<Vec<u8>>);

impl BucketPath {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self(parts.into_iter().map(|p| p.as_ref().to_vec()).collect())
    }

    /// A new path with `parts` appended; never shares storage with `self`
    pub fn join<I, S>(&self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut segments = self.0.clone();
        segments.extend(parts.into_iter().map(|p| p.as_ref().to_vec()));
        Self(segments)
    }

    pub fn segments(&self) -> &[Vec<u8>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, if any
    pub fn leaf(&self) -> Option<&[u8]> {
        self.0.last().map(|s| s.as_slice())
    }

    fn split_leaf(&self) -> Result<(BucketPath, &[u8])> {
        match self.0.split_last() {
            Some((leaf, parent)) => Ok((BucketPath(parent.to_vec()), leaf.as_slice())),
            None => Err(FsError::InvalidArgument("empty bucket path".to_string())),
        }
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Descend segment by segment; `None` at the first missing namespace
    pub fn resolve<T: Transaction>(&self, tx: &T) -> Result<Option<T::Namespace>> {
        let mut ns = tx.root();
        for segment in &self.0 {
            match tx.lookup(&ns, segment)? {
                Lookup::Namespace(child) => ns = child,
                Lookup::Absent | Lookup::Value(_) => return Ok(None),
            }
        }
        Ok(Some(ns))
    }

    /// Descend, creating every missing namespace on the way
    pub fn ensure<T: Transaction>(&self, tx: &mut T) -> Result<T::Namespace> {
        let mut ns = tx.root();
        for segment in &self.0 {
            ns = tx.create_if_absent(&ns, segment)?;
        }
        Ok(ns)
    }

    /// Ensure the parent chain, then create the final namespace.
    /// Fails if the final segment already exists.
    pub fn create_leaf<T: Transaction>(&self, tx: &mut T) -> Result<T::Namespace> {
        let (parent, leaf) = self.split_leaf()?;
        let parent_ns = parent.ensure(tx)?;
        tx.create(&parent_ns, leaf)
    }

    /// Delete the final namespace; a no-op when the parent chain is missing
    pub fn delete<T: Transaction>(&self, tx: &mut T) -> Result<()> {
        let (parent, leaf) = self.split_leaf()?;
        match parent.resolve(&*tx)? {
            Some(parent_ns) => tx.delete(&parent_ns, leaf),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for BucketPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.0 {
            match std::str::from_utf8(segment) {
                Ok(s) if !s.is_empty() && s.chars().all(|c| !c.is_control()) => write!(f, "/{}", s)?,
                _ => {
                    write!(f, "/0x")?;
                    for b in segment {
                        write!(f, "{:02x}", b)?;
                    }
                }
            }
        }
        Ok(())
    }
}
