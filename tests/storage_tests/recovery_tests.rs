//! Tests for corruption handling and recovery
//!
//! These tests verify:
//! - Index corruption (at open and mid-session) resets the directory
//! - Content corruption (at open and mid-session) breaks the content store
//!   for the session and resets the directory on the next open
//! - Dangling content references are caught at open

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use localvcs_store::{
    ContentId, Entry, EntryId, LocalVcsStorage, OpenReport, Snapshot, StorageError,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_storage() -> (TempDir, PathBuf, LocalVcsStorage) {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().to_path_buf();
    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    (temp_dir, dir, storage)
}

fn reopen(storage: LocalVcsStorage, dir: &Path) -> LocalVcsStorage {
    storage.close().unwrap();
    LocalVcsStorage::open_path(dir).unwrap()
}

fn corrupt_file(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"bla-bla-bla").unwrap();
}

fn snapshot_with_counter(counter: u64) -> Snapshot {
    let mut snapshot = Snapshot::empty();
    snapshot.entry_counter = counter;
    snapshot
}

fn snapshot_referencing(id: ContentId) -> Snapshot {
    let mut snapshot = Snapshot::empty();
    snapshot
        .root
        .add_child(Entry::file(EntryId(1), "file", Some(id), 0))
        .unwrap();
    snapshot.entry_counter = 1;
    snapshot
}

// =============================================================================
// Index Corruption
// =============================================================================

#[test]
fn test_cleaning_on_corrupted_storage() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store(&snapshot_with_counter(111)).unwrap();
    storage.close().unwrap();

    corrupt_file(&dir, "storage");

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert!(matches!(
        storage.open_report(),
        OpenReport::IndexCorrupt { .. }
    ));
    assert_eq!(storage.load().unwrap().entry_counter, 0);
}

#[test]
fn test_creating_same_content_id_after_index_corruption() {
    let (_temp, dir, storage) = setup_temp_storage();
    let before = storage.store_content(b"abc").unwrap();
    storage.close().unwrap();

    corrupt_file(&dir, "storage");

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    let after = storage.store_content(b"abc").unwrap();

    assert_eq!(before.id(), after.id());
    assert_eq!(after.id(), Some(ContentId(0)));
}

#[test]
fn test_corrupted_index_payload_detected() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store(&snapshot_with_counter(42)).unwrap();
    storage.close().unwrap();

    // Keep the header intact, flip the last payload byte
    let path = dir.join("storage");
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert!(matches!(
        storage.open_report(),
        OpenReport::IndexCorrupt { .. }
    ));
    assert_eq!(storage.load().unwrap(), Snapshot::empty());
}

#[test]
fn test_index_corrupted_during_session() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store_content(b"abc").unwrap();
    storage.store(&snapshot_with_counter(3)).unwrap();

    corrupt_file(&dir, "storage");

    let loaded = storage.load().unwrap();
    assert_eq!(loaded, Snapshot::empty());

    // Both stores were reset, so ids start over
    let content = storage.store_content(b"def").unwrap();
    assert_eq!(content.id(), Some(ContentId(0)));
    assert_eq!(storage.load().unwrap().entry_counter, 0);
}

// =============================================================================
// Content Corruption At Open
// =============================================================================

#[test]
fn test_cleaning_on_corrupted_contents() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store(&snapshot_with_counter(111)).unwrap();
    storage.close().unwrap();

    corrupt_file(&dir, "contents");

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert_eq!(storage.open_report(), &OpenReport::ContentCorrupt);
    assert_eq!(storage.load().unwrap().entry_counter, 0);
}

#[test]
fn test_unavailable_content_after_corruption_at_open() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store_content(b"abc").unwrap();
    storage.close().unwrap();

    corrupt_file(&dir, "contents");

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert!(!storage.store_content(b"def").unwrap().is_available());

    let err = storage.load_content_data(ContentId(0)).unwrap_err();
    assert!(err.is_io());
}

#[test]
fn test_next_open_after_content_corruption_is_healthy() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store_content(b"abc").unwrap();
    storage.close().unwrap();

    corrupt_file(&dir, "contents");

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert_eq!(storage.open_report(), &OpenReport::ContentCorrupt);

    let storage = reopen(storage, &dir);
    assert_eq!(storage.open_report(), &OpenReport::ResetPending);

    let content = storage.store_content(b"def").unwrap();
    assert_eq!(content.id(), Some(ContentId(0)));
    assert_eq!(&storage.load_content_data(ContentId(0)).unwrap()[..], b"def");
}

#[test]
fn test_corrupted_record_checksum_detected() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store_content(b"some file content").unwrap();
    storage.close().unwrap();

    let path = dir.join("contents");
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert_eq!(storage.open_report(), &OpenReport::ContentCorrupt);
}

#[test]
fn test_torn_trailing_record_detected() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store_content(b"complete").unwrap();
    storage.close().unwrap();

    let mut file = OpenOptions::new()
        .append(true)
        .open(dir.join("contents"))
        .unwrap();
    file.write_all(&[1, 1, 0, 0]).unwrap();
    drop(file);

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert_eq!(storage.open_report(), &OpenReport::ContentCorrupt);
}

#[test]
fn test_oversized_record_length_is_corruption() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store(&snapshot_with_counter(7)).unwrap();
    storage.close().unwrap();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"LVCT");
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.push(1);
    bytes.extend_from_slice(&0u64.to_le_bytes());
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    fs::write(dir.join("contents"), bytes).unwrap();

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert_eq!(storage.open_report(), &OpenReport::ContentCorrupt);
    assert_eq!(storage.load().unwrap().entry_counter, 0);
}

// =============================================================================
// Content Corruption During Session
// =============================================================================

#[test]
fn test_good_content_fails_after_unknown_id_read() {
    let (_temp, _dir, storage) = setup_temp_storage();
    let content = storage.store_content(b"abc").unwrap();

    let err = storage.load_content_data(ContentId(100)).unwrap_err();
    assert!(err.is_io());

    let err = storage
        .load_content_data(content.id().unwrap())
        .unwrap_err();
    assert!(err.is_io());
    assert!(matches!(err, StorageError::ContentStoreBroken));
}

#[test]
fn test_unavailable_content_on_write_after_breakage() {
    let (_temp, _dir, storage) = setup_temp_storage();
    storage.store_content(b"abc").unwrap();

    assert!(storage.load_content_data(ContentId(7)).is_err());

    assert!(!storage.store_content(b"def").unwrap().is_available());
}

#[test]
fn test_content_corrupted_during_session() {
    let (_temp, dir, storage) = setup_temp_storage();
    let content = storage.store_content(b"abc").unwrap();
    storage.store(&snapshot_with_counter(5)).unwrap();

    corrupt_file(&dir, "contents");

    let err = storage
        .load_content_data(content.id().unwrap())
        .unwrap_err();
    assert!(err.is_io());

    // First load after breakage clears the index
    assert_eq!(storage.load().unwrap(), Snapshot::empty());

    // The index keeps working for the rest of the session
    storage.store(&snapshot_with_counter(9)).unwrap();
    assert_eq!(storage.load().unwrap().entry_counter, 9);

    // The next open wipes both artifacts
    let storage = reopen(storage, &dir);
    assert_eq!(storage.open_report(), &OpenReport::ResetPending);
    assert_eq!(storage.load().unwrap().entry_counter, 0);
    assert!(storage.store_content(b"fresh").unwrap().is_available());
}

#[test]
fn test_purged_flags_survive_breakage() {
    let (_temp, _dir, storage) = setup_temp_storage();
    let c1 = storage.store_content(b"1").unwrap();
    storage.purge_contents(&[c1.clone()]).unwrap();

    assert!(storage.load_content_data(ContentId(50)).is_err());

    assert!(storage.is_content_purged(&c1).unwrap());
}

// =============================================================================
// Cross-Store Consistency
// =============================================================================

#[test]
fn test_dangling_content_reference_resets_on_open() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store(&snapshot_referencing(ContentId(3))).unwrap();

    let storage = reopen(storage, &dir);

    assert_eq!(
        storage.open_report(),
        &OpenReport::DanglingContent { id: ContentId(3) }
    );
    assert_eq!(storage.load().unwrap(), Snapshot::empty());
}

#[test]
fn test_missing_contents_file_with_references_resets() {
    let (_temp, dir, storage) = setup_temp_storage();
    let content = storage.store_content(b"abc").unwrap();
    storage
        .store(&snapshot_referencing(content.id().unwrap()))
        .unwrap();
    storage.close().unwrap();

    fs::remove_file(dir.join("contents")).unwrap();

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert_eq!(
        storage.open_report(),
        &OpenReport::DanglingContent { id: ContentId(0) }
    );
    assert_eq!(storage.load().unwrap(), Snapshot::empty());
}

#[test]
fn test_verify_reports_corrupt_content_without_reset() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store_content(b"abc").unwrap();

    corrupt_file(&dir, "contents");

    let report = storage.verify().unwrap();
    assert!(report.content.is_err());
    assert!(report.index.is_ok());
    assert!(!report.is_consistent());
}
