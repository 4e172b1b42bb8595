//! Tests for BucketPath
//!
//! These tests verify:
//! - Join never aliases the source path
//! - Resolve stops at the first missing segment
//! - Ensure / create_leaf / delete against a live transaction

use atlasfs::kv::{Database, Lookup, Transaction, TreeDb};
use atlasfs::{BucketPath, FsError};

// =============================================================================
// Helper Functions
// =============================================================================

fn path(parts: &[&str]) -> BucketPath {
    BucketPath::new(parts.iter().map(|p| p.as_bytes()))
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_join_appends_segments() {
    let base = path(&["a", "b"]);
    let joined = base.join(["c", "d"]);

    assert_eq!(joined, path(&["a", "b", "c", "d"]));
    assert_eq!(joined.len(), 4);
    assert_eq!(joined.leaf(), Some(&b"d"[..]));
}

#[test]
fn test_join_does_not_alias_source() {
    let base = path(&["a"]);
    let first = base.join(["x"]);
    let second = base.join(["y"]);

    assert_eq!(base, path(&["a"]));
    assert_eq!(first, path(&["a", "x"]));
    assert_eq!(second, path(&["a", "y"]));
}

#[test]
fn test_equality_is_element_wise() {
    assert_eq!(path(&["ab", "c"]), path(&["ab", "c"]));
    assert_ne!(path(&["ab", "c"]), path(&["a", "bc"]));
    assert!(BucketPath::default().is_empty());
}

#[test]
fn test_display_renders_binary_segments_as_hex() {
    let p = path(&["inodes"]).join([1u64.to_le_bytes()]);
    assert_eq!(p.to_string(), "/inodes/0x0100000000000000");
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[test]
fn test_resolve_missing_segment_is_none() {
    let db = TreeDb::in_memory();
    db.update(|tx| {
        path(&["a", "b"]).ensure(tx)?;
        Ok(())
    })
    .unwrap();

    db.view(|tx| {
        assert!(path(&["a", "b"]).resolve(tx)?.is_some());
        assert!(path(&["a", "missing", "b"]).resolve(tx)?.is_none());
        assert!(path(&["nothing"]).resolve(tx)?.is_none());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_resolve_through_value_is_none() {
    let db = TreeDb::in_memory();
    db.update(|tx| {
        let a = path(&["a"]).ensure(tx)?;
        tx.put(&a, b"file", b"data")
    })
    .unwrap();

    db.view(|tx| {
        assert!(path(&["a", "file"]).resolve(tx)?.is_none());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_ensure_is_idempotent() {
    let db = TreeDb::in_memory();
    for _ in 0..2 {
        db.update(|tx| {
            path(&["x", "y", "z"]).ensure(tx)?;
            Ok(())
        })
        .unwrap();
    }

    db.view(|tx| {
        assert!(path(&["x", "y", "z"]).resolve(tx)?.is_some());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_ensure_fails_on_value_collision() {
    let db = TreeDb::in_memory();
    db.update(|tx| {
        let a = path(&["a"]).ensure(tx)?;
        tx.put(&a, b"taken", b"value")
    })
    .unwrap();

    let result = db.update(|tx| path(&["a", "taken", "child"]).ensure(tx));
    assert!(matches!(result, Err(FsError::IncompatibleValue(_))));
}

#[test]
fn test_create_leaf_creates_parents() {
    let db = TreeDb::in_memory();
    db.update(|tx| {
        path(&["p", "q", "leaf"]).create_leaf(tx)?;
        Ok(())
    })
    .unwrap();

    db.view(|tx| {
        let q = path(&["p", "q"]).resolve(tx)?.unwrap();
        assert!(matches!(tx.lookup(&q, b"leaf")?, Lookup::Namespace(_)));
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_create_leaf_fails_when_present() {
    let db = TreeDb::in_memory();
    db.update(|tx| {
        path(&["p", "leaf"]).create_leaf(tx)?;
        Ok(())
    })
    .unwrap();

    let result = db.update(|tx| path(&["p", "leaf"]).create_leaf(tx));
    assert!(matches!(result, Err(FsError::KeyExists)));
}

#[test]
fn test_delete_removes_leaf() {
    let db = TreeDb::in_memory();
    db.update(|tx| {
        path(&["p", "leaf", "deeper"]).ensure(tx)?;
        Ok(())
    })
    .unwrap();

    db.update(|tx| path(&["p", "leaf"]).delete(tx)).unwrap();

    db.view(|tx| {
        assert!(path(&["p"]).resolve(tx)?.is_some());
        assert!(path(&["p", "leaf"]).resolve(tx)?.is_none());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_delete_with_missing_parent_is_noop() {
    let db = TreeDb::in_memory();
    db.update(|tx| path(&["no", "such", "leaf"]).delete(tx)).unwrap();
}

#[test]
fn test_empty_path_operations() {
    let db = TreeDb::in_memory();

    db.view(|tx| {
        assert!(BucketPath::default().resolve(tx)?.is_some());
        Ok(())
    })
    .unwrap();

    let result = db.update(|tx| BucketPath::default().create_leaf(tx));
    assert!(matches!(result, Err(FsError::InvalidArgument(_))));
}
