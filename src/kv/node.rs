//! Namespace tree nodes
//!
//! Copy-on-write tree shared between snapshots. A write transaction clones
//! only the nodes along the paths it mutates (`Arc::make_mut`); untouched
//! subtrees stay shared with every open snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{FsError, Result};
use crate::wal::Operation;

/// One namespace: an ordered map of keys to values or child namespaces
#[derive(Debug, Clone, Default)]
pub(crate) struct Node {
    pub(crate) entries: BTreeMap<Vec<u8>, Entry>,
}

#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Value(Bytes),
    Bucket(Arc<Node>),
}

/// Walk `keys` from `root`, returning the namespace they name
pub(crate) fn descend<'a>(root: &'a Arc<Node>, keys: &[Vec<u8>]) -> Option<&'a Arc<Node>> {
    let mut node = root;
    for key in keys {
        match node.entries.get(key) {
            Some(Entry::Bucket(child)) => node = child,
            _ => return None,
        }
    }
    Some(node)
}

/// Apply one logged mutation to the tree rooted at `root`
pub(crate) fn apply(root: &mut Arc<Node>, op: &Operation) -> Result<()> {
    match op {
        Operation::CreateBucket { path } => {
            let (key, parent) = split(path)?;
            let node = descend_mut(root, parent)?;
            if node.entries.contains_key(key) {
                return Err(FsError::KeyExists);
            }
            node.entries
                .insert(key.to_vec(), Entry::Bucket(Arc::new(Node::default())));
        }
        Operation::DeleteBucket { path } => {
            let (key, parent) = split(path)?;
            let node = descend_mut(root, parent)?;
            match node.entries.get(key).map(|e| matches!(e, Entry::Bucket(_))) {
                Some(true) => {
                    node.entries.remove(key);
                }
                Some(false) => {
                    return Err(FsError::IncompatibleValue(
                        "cannot delete a value as a bucket".to_string(),
                    ))
                }
                None => return Err(FsError::KeyNotFound),
            }
        }
        Operation::Put { path, value } => {
            let (key, parent) = split(path)?;
            let node = descend_mut(root, parent)?;
            if matches!(node.entries.get(key), Some(Entry::Bucket(_))) {
                return Err(FsError::IncompatibleValue(
                    "cannot put a value over a bucket".to_string(),
                ));
            }
            node.entries
                .insert(key.to_vec(), Entry::Value(Bytes::copy_from_slice(value)));
        }
    }
    Ok(())
}

fn split(path: &[Vec<u8>]) -> Result<(&[u8], &[Vec<u8>])> {
    match path.split_last() {
        Some((key, _)) if key.is_empty() => Err(FsError::Storage("key required".to_string())),
        Some((key, parent)) => Ok((key.as_slice(), parent)),
        None => Err(FsError::Storage("empty namespace path".to_string())),
    }
}

fn descend_mut<'a>(root: &'a mut Arc<Node>, keys: &[Vec<u8>]) -> Result<&'a mut Node> {
    let mut node = Arc::make_mut(root);
    for key in keys {
        node = match node.entries.get_mut(key) {
            Some(Entry::Bucket(child)) => Arc::make_mut(child),
            Some(Entry::Value(_)) => {
                return Err(FsError::IncompatibleValue(
                    "path segment is a value, not a bucket".to_string(),
                ))
            }
            None => return Err(FsError::KeyNotFound),
        };
    }
    Ok(node)
}
