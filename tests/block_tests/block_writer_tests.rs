//! Tests for BlockWriter
//!
//! These tests verify:
//! - Blocks land under dense little-endian keys starting at 0
//! - Counters track persisted blocks and bytes
//! - A missing inode fails without advancing

use atlasfs::block::{block_index, block_key, BlockReader, BlockSink, BlockWriter, ChunkedWriter};
use atlasfs::kv::{Cursor, Database, Slot, Transaction};
use atlasfs::{BucketPath, FsError, TreeDb};

// =============================================================================
// Helper Functions
// =============================================================================

fn inode(id: u64) -> BucketPath {
    BucketPath::new([&b"inodes"[..]]).join([id.to_le_bytes()])
}

fn create_inode(db: &TreeDb, path: &BucketPath) {
    db.update(|tx| path.create_leaf(tx)).unwrap();
}

fn stored_blocks(db: &TreeDb, path: &BucketPath) -> Vec<(u64, Vec<u8>)> {
    db.view(|tx| {
        let ns = path.resolve(tx)?.unwrap();
        let mut cursor = tx.cursor(&ns)?;
        let mut out = Vec::new();
        let mut entry = cursor.first();
        while let Some((key, slot)) = entry {
            let Slot::Value(block) = slot else {
                panic!("namespace inside inode");
            };
            out.push((block_index(&key).unwrap(), block.to_vec()));
            entry = cursor.next();
        }
        Ok(out)
    })
    .unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_block_keys() {
    assert_eq!(block_key(0), [0u8; 8]);
    assert_eq!(block_key(258), [2, 1, 0, 0, 0, 0, 0, 0]);
    assert_eq!(block_index(&block_key(u64::MAX)), Some(u64::MAX));
    assert_eq!(block_index(b"short"), None);
}

#[test]
fn test_blocks_are_stored_densely() {
    let db = TreeDb::in_memory();
    let path = inode(0);
    create_inode(&db, &path);

    let mut writer = BlockWriter::new(db.clone(), path.clone());
    writer.write_block(b"first").unwrap();
    writer.write_block(b"secon").unwrap();
    writer.write_block(b"d").unwrap();

    assert_eq!(writer.blocks(), 3);
    assert_eq!(writer.bytes_written(), 11);
    assert_eq!(
        stored_blocks(&db, &path),
        vec![
            (0, b"first".to_vec()),
            (1, b"secon".to_vec()),
            (2, b"d".to_vec()),
        ]
    );
}

#[test]
fn test_keys_stay_dense_past_one_byte() {
    let db = TreeDb::in_memory();
    let path = inode(1);
    create_inode(&db, &path);

    let mut writer = BlockWriter::new(db.clone(), path.clone());
    for i in 0..300u64 {
        writer.write_block(&i.to_le_bytes()).unwrap();
    }

    // The store orders keys bytewise, so block 256 sorts right after block 0
    let stored = stored_blocks(&db, &path);
    assert_eq!(stored[1].0, 256);

    let mut indices: Vec<u64> = stored
        .iter()
        .map(|(i, block)| {
            assert_eq!(block, &i.to_le_bytes());
            *i
        })
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..300).collect::<Vec<_>>());
}

#[test]
fn test_file_spanning_many_blocks_reads_back_in_order() {
    let db = TreeDb::in_memory();
    let path = inode(3);
    create_inode(&db, &path);

    let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    let mut chunked = ChunkedWriter::new(BlockWriter::new(db.clone(), path.clone()), 1);
    chunked.write(&data).unwrap();
    chunked.close().unwrap();

    let read_back = db
        .view(|tx| {
            let ns = path.resolve(tx)?.unwrap();
            let mut reader = BlockReader::new(tx.cursor(&ns)?, 1, data.len() as u64)?;
            let mut buf = vec![0u8; data.len()];
            let outcome = reader.read_chunk(&mut buf)?;
            assert!(outcome.eof);
            Ok(buf)
        })
        .unwrap();
    assert_eq!(read_back, data);
}

#[test]
fn test_missing_inode_fails_without_advancing() {
    let db = TreeDb::in_memory();
    let mut writer = BlockWriter::new(db.clone(), inode(9));

    let result = writer.write_block(b"data");
    assert!(matches!(result, Err(FsError::NotFound(_))));
    assert_eq!(writer.blocks(), 0);
    assert_eq!(writer.bytes_written(), 0);
}

#[test]
fn test_chunked_writer_over_block_writer() {
    let db = TreeDb::in_memory();
    let path = inode(2);
    create_inode(&db, &path);

    let mut chunked = ChunkedWriter::new(BlockWriter::new(db.clone(), path.clone()), 4);
    chunked.write(b"0123456789").unwrap();
    chunked.close().unwrap();

    assert_eq!(chunked.sink().blocks(), 3);
    let contents: Vec<u8> = stored_blocks(&db, &path)
        .into_iter()
        .flat_map(|(_, b)| b)
        .collect();
    assert_eq!(contents, b"0123456789");
}
