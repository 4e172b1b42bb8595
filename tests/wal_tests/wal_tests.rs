//! Tests for the write-ahead log
//!
//! These tests verify:
//! - Frames written by WalWriter read back in order
//! - LSNs continue across reopen
//! - Torn tails and CRC damage are truncated by recovery
//! - Verify mode reports without modifying the file

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use atlasfs::wal::{Durability, Operation, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use atlasfs::{FsError, WalSyncStrategy};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        path: vec![b"root".to_vec(), key.as_bytes().to_vec()],
        value: value.as_bytes().to_vec(),
    }
}

fn write_entries(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite, 1).unwrap();
    for i in 0..count {
        writer
            .append(vec![put(&format!("key{}", i), &format!("value{}", i))], Durability::Immediate)
            .unwrap();
    }
}

// =============================================================================
// Writer / Reader Tests
// =============================================================================

#[test]
fn test_append_and_read_back() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite, 1).unwrap();
    let first = writer
        .append(
            vec![
                Operation::CreateBucket { path: vec![b"root".to_vec()] },
                put("a", "1"),
            ],
            Durability::Immediate,
        )
        .unwrap();
    let second = writer
        .append(vec![Operation::DeleteBucket { path: vec![b"root".to_vec()] }], Durability::Immediate)
        .unwrap();
    assert_eq!((first, second), (1, 2));
    assert_eq!(writer.current_lsn(), 3);
    drop(writer);

    let entries: Vec<WalEntry> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].lsn, 1);
    assert_eq!(entries[0].operations.len(), 2);
    assert_eq!(entries[0].operations[1], put("a", "1"));
    assert_eq!(
        entries[1].operations,
        vec![Operation::DeleteBucket { path: vec![b"root".to_vec()] }]
    );
}

#[test]
fn test_frame_layout() {
    let entry = WalEntry::new(42, vec![put("k", "v")]);
    let frame = entry.encode().unwrap();

    assert_eq!(&frame[0..8], &42u64.to_le_bytes());
    let len = u32::from_le_bytes(frame[12..16].try_into().unwrap()) as usize;
    assert_eq!(frame.len(), HEADER_SIZE + len);

    let crc = u32::from_le_bytes(frame[8..12].try_into().unwrap());
    assert_eq!(crc, crc32fast::hash(&frame[HEADER_SIZE..]));
    assert_eq!(WalEntry::decode(42, crc, &frame[HEADER_SIZE..]).unwrap(), entry);
}

#[test]
fn test_decode_rejects_bad_crc_and_lsn() {
    let frame = WalEntry::new(7, vec![put("k", "v")]).encode().unwrap();
    let crc = u32::from_le_bytes(frame[8..12].try_into().unwrap());
    let data = &frame[HEADER_SIZE..];

    assert!(matches!(
        WalEntry::decode(7, crc ^ 1, data),
        Err(FsError::WalCorruption(_))
    ));
    assert!(matches!(
        WalEntry::decode(8, crc, data),
        Err(FsError::WalCorruption(_))
    ));
}

#[test]
fn test_deferred_appends_wait_for_threshold() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }, 1).unwrap();
    writer.append(vec![put("a", "1")], Durability::Deferred).unwrap();
    writer.append(vec![put("b", "2")], Durability::Deferred).unwrap();
    assert_eq!(writer.unsynced(), 2);

    writer.append(vec![put("c", "3")], Durability::Deferred).unwrap();
    assert_eq!(writer.unsynced(), 0);

    let mut every_write = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite, 4).unwrap();
    every_write.append(vec![put("d", "4")], Durability::Deferred).unwrap();
    assert_eq!(every_write.unsynced(), 1);
    every_write.append(vec![put("e", "5")], Durability::Immediate).unwrap();
    assert_eq!(every_write.unsynced(), 0);
}

#[test]
fn test_lsn_continues_after_reopen() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 3);

    let (_, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(result.last_lsn, 3);

    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite, result.last_lsn + 1).unwrap();
    assert_eq!(writer.append(vec![put("x", "y")], Durability::Immediate).unwrap(), 4);
    drop(writer);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(result.last_lsn, 4);
    assert!(!result.was_truncated);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_truncates_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 5);
    let clean_len = fs::metadata(&wal_path).unwrap().len();

    let torn = WalEntry::new(6, vec![put("torn", "entry")]).encode().unwrap();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&torn[..torn.len() - 3]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 5);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 5);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), clean_len);
}

#[test]
fn test_recover_stops_at_crc_mismatch() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 3);

    // Flip a byte in the data section of the last frame
    let mut bytes = fs::read(&wal_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&wal_path, &bytes).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.last_lsn, 2);
    assert!(result.was_truncated);
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 2);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[1u8; 5]).unwrap();
    drop(file);
    let len_before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);
}

#[test]
fn test_recover_rejects_non_increasing_lsn() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut file = File::create(&wal_path).unwrap();
    for lsn in [1u64, 2, 2] {
        file.write_all(&WalEntry::new(lsn, vec![put("k", "v")]).encode().unwrap())
            .unwrap();
    }
    drop(file);

    assert!(matches!(
        WalRecovery::recover(&wal_path),
        Err(FsError::WalCorruption(_))
    ));
}

#[test]
fn test_huge_declared_length_is_a_torn_frame() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 2);
    let clean_len = fs::metadata(&wal_path).unwrap().len();

    // A garbage header claiming a 4 GiB entry, followed by a few bytes
    let mut header = Vec::with_capacity(HEADER_SIZE + 3);
    header.extend_from_slice(&3u64.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes());
    header.extend_from_slice(&u32::MAX.to_le_bytes());
    header.extend_from_slice(b"abc");
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&header).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), clean_len);
}

// =============================================================================
// Failed Append Tests
// =============================================================================

#[test]
fn test_len_tracks_successful_appends() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 3);
    let on_disk = fs::metadata(&wal_path).unwrap().len();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite, 4).unwrap();
    assert_eq!(writer.len(), on_disk);

    let frame_len = WalEntry::new(4, vec![put("d", "4")]).encode().unwrap().len() as u64;
    writer.append(vec![put("d", "4")], Durability::Deferred).unwrap();
    assert_eq!(writer.len(), on_disk + frame_len);
    // Deferred entries are already handed to the OS
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), writer.len());
}

#[cfg(target_os = "linux")]
#[test]
fn test_failed_append_consumes_no_lsn() {
    let device = Path::new("/dev/full");
    if !device.exists() {
        return;
    }

    let Ok(mut writer) = WalWriter::open(device, WalSyncStrategy::EveryWrite, 1) else {
        return;
    };
    let result = writer.append(vec![put("k", "v")], Durability::Immediate);

    assert!(matches!(result, Err(FsError::Io(_))));
    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(writer.unsynced(), 0);

    // A device cannot be truncated, so the writer refuses further appends
    assert!(writer.is_poisoned());
    assert!(matches!(
        writer.append(vec![put("k", "v")], Durability::Immediate),
        Err(FsError::Storage(_))
    ));
}
