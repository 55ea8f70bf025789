//! Tests for the read-only Inspector
//!
//! These tests verify:
//! - Damaged directories are reported as inconsistent
//! - Inspection never resets or rewrites either artifact
//! - Version mismatches are reported, not wiped
//! - Facade `verify` reports a content store broken this session

use std::fs;
use std::path::{Path, PathBuf};

use localvcs_store::index::IndexState;
use localvcs_store::{
    ContentId, Entry, EntryId, Inspector, LocalVcsStorage, OpenReport, Snapshot, StorageError,
    SCHEMA_VERSION,
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

fn corrupt_file(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"bla-bla-bla").unwrap();
}

fn populated_dir() -> (TempDir, PathBuf) {
    let (temp, dir, storage) = setup_temp_storage();
    let content = storage.store_content(b"hello").unwrap();

    let mut snapshot = Snapshot::empty();
    snapshot
        .root
        .add_child(Entry::file(EntryId(1), "greeting", content.id(), 0))
        .unwrap();
    snapshot.entry_counter = 1;
    storage.store(&snapshot).unwrap();
    storage.close().unwrap();

    (temp, dir)
}

// =============================================================================
// Inspector Tests
// =============================================================================

#[test]
fn test_clean_directory_is_consistent() {
    let (_temp, dir) = populated_dir();

    let report = Inspector::new(&dir, SCHEMA_VERSION).verify();

    assert!(report.is_consistent());
    let index = report.index.unwrap();
    assert_eq!(index.version, SCHEMA_VERSION);
    assert_eq!(index.state, IndexState::Clean);
    assert_eq!(index.content_refs, 1);
    assert_eq!(report.content.unwrap().blob_count, 1);
}

#[test]
fn test_corrupt_contents_reported_and_left_alone() {
    let (_temp, dir) = populated_dir();
    corrupt_file(&dir, "contents");

    let report = Inspector::new(&dir, SCHEMA_VERSION).verify();

    assert!(!report.is_consistent());
    assert!(report.content.is_err());
    assert_eq!(fs::read(dir.join("contents")).unwrap(), b"bla-bla-bla");
}

#[test]
fn test_corrupt_index_reported_and_left_alone() {
    let (_temp, dir) = populated_dir();
    corrupt_file(&dir, "storage");

    let inspector = Inspector::new(&dir, SCHEMA_VERSION);
    let report = inspector.verify();

    assert!(!report.is_consistent());
    assert!(report.index.is_err());
    assert!(report.content.is_ok());
    assert!(matches!(
        inspector.snapshot(),
        Err(StorageError::IndexCorruption(_))
    ));
    assert_eq!(fs::read(dir.join("storage")).unwrap(), b"bla-bla-bla");
}

#[test]
fn test_version_mismatch_reported_without_wiping() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().to_path_buf();
    let storage = LocalVcsStorage::open_with_version(&dir, 3).unwrap();
    let mut snapshot = Snapshot::empty();
    snapshot.entry_counter = 5;
    storage.store(&snapshot).unwrap();
    storage.close().unwrap();

    let report = Inspector::new(&dir, 4).verify();

    assert!(!report.is_consistent());
    assert_eq!(report.index.unwrap().version, 3);
    assert_eq!(
        Inspector::new(&dir, 4).snapshot().unwrap().entry_counter,
        5
    );

    let storage = LocalVcsStorage::open_with_version(&dir, 3).unwrap();
    assert_eq!(storage.open_report(), &OpenReport::Clean);
    assert_eq!(storage.load().unwrap().entry_counter, 5);
}

#[test]
fn test_dangling_reference_reported() {
    let (_temp, dir, storage) = setup_temp_storage();
    let mut snapshot = Snapshot::empty();
    snapshot
        .root
        .add_child(Entry::file(EntryId(1), "a", Some(ContentId(2)), 0))
        .unwrap();
    snapshot.entry_counter = 1;
    storage.store(&snapshot).unwrap();
    storage.close().unwrap();

    let report = Inspector::new(&dir, SCHEMA_VERSION).verify();

    assert!(!report.is_consistent());
    assert_eq!(report.index.unwrap().dangling, vec![ContentId(2)]);
}

#[test]
fn test_reset_pending_directory_is_inconsistent() {
    let (_temp, dir, storage) = setup_temp_storage();
    storage.store_content(b"abc").unwrap();

    // Breaks the content store, which marks the index for reset
    assert!(storage.load_content_data(ContentId(10)).is_err());
    storage.close().unwrap();

    let report = Inspector::new(&dir, SCHEMA_VERSION).verify();

    assert!(!report.is_consistent());
    assert_eq!(report.index.unwrap().state, IndexState::ResetPending);
}

#[test]
fn test_missing_directory_is_inconsistent() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("never-created");

    let report = Inspector::new(&dir, SCHEMA_VERSION).verify();

    assert!(!report.is_consistent());
    assert!(!dir.exists());
}

#[test]
fn test_content_data_reads_without_side_effects() {
    let (_temp, dir) = populated_dir();
    let inspector = Inspector::new(&dir, SCHEMA_VERSION);

    assert_eq!(&inspector.content_data(ContentId(0)).unwrap()[..], b"hello");
    assert!(matches!(
        inspector.content_data(ContentId(9)),
        Err(StorageError::ContentNotFound(_))
    ));

    // An unknown id did not mark anything for reset
    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert_eq!(storage.open_report(), &OpenReport::Clean);
    assert_eq!(&storage.load_content_data(ContentId(0)).unwrap()[..], b"hello");
}

// =============================================================================
// Facade Verify Tests
// =============================================================================

#[test]
fn test_verify_after_content_corrupt_open_is_inconsistent() {
    let (_temp, dir) = populated_dir();
    corrupt_file(&dir, "contents");

    let storage = LocalVcsStorage::open_path(&dir).unwrap();
    assert_eq!(storage.open_report(), &OpenReport::ContentCorrupt);

    let report = storage.verify().unwrap();
    assert!(!report.is_consistent());
    assert!(report.content.is_err());
}
