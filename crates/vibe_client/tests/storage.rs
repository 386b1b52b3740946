use std::fs;

use tempfile::TempDir;
use vibe_client::{
    ensure_state_dir, AtomicFileWriter, FileStore, KeyValueStore, MemoryStore, StorageError,
    StoreSettings,
};

fn settings(quota_bytes: u64) -> StoreSettings {
    StoreSettings {
        quota_bytes,
        soft_cap_bytes: quota_bytes,
    }
}

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("state");
    assert!(!new_dir.exists());
    ensure_state_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("workflowState.json", "{}").unwrap();
    assert_eq!(fs::read_to_string(&first).unwrap(), "{}");

    let second = writer.write("workflowState.json", r#"{"currentStep":2}"#).unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), r#"{"currentStep":2}"#);
}

#[test]
fn file_in_place_of_directory_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let err = FileStore::open(file_path, StoreSettings::default()).unwrap_err();
    assert!(matches!(err, StorageError::NotADirectory(_)));
}

#[test]
fn file_store_round_trips_and_lists_keys() {
    let temp = TempDir::new().unwrap();
    let mut store = FileStore::open(temp.path().join("state"), StoreSettings::default()).unwrap();

    assert_eq!(store.get("workflowState").unwrap(), None);
    store.set("workflowState", "abc").unwrap();
    store.set("workflowCache", "12345").unwrap();

    assert_eq!(store.get("workflowState").unwrap().as_deref(), Some("abc"));
    assert_eq!(
        store.keys().unwrap(),
        vec!["workflowCache".to_string(), "workflowState".to_string()]
    );
    assert_eq!(store.total_size().unwrap(), (13 + 3 + 13 + 5) as u64);

    store.remove("workflowCache").unwrap();
    store.remove("workflowCache").unwrap();
    assert_eq!(store.keys().unwrap(), vec!["workflowState".to_string()]);
}

#[test]
fn file_store_enforces_quota_and_keeps_old_value() {
    let temp = TempDir::new().unwrap();
    let mut store = FileStore::open(temp.path().to_path_buf(), settings(20)).unwrap();

    store.set("state", "0123456789").unwrap();
    let err = store.set("state", "0123456789abcdefghij").unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { .. }));
    assert_eq!(store.get("state").unwrap().as_deref(), Some("0123456789"));

    // Replacing a value only counts the new size.
    store.set("state", "abcdefghijklmno").unwrap();
}

#[test]
fn file_store_rejects_path_like_keys() {
    let temp = TempDir::new().unwrap();
    let mut store = FileStore::open(temp.path().to_path_buf(), StoreSettings::default()).unwrap();
    assert!(matches!(
        store.set("../escape", "x"),
        Err(StorageError::InvalidKey(_))
    ));
}

#[test]
fn memory_store_quota() {
    let mut store = MemoryStore::with_quota(10);
    store.set("a", "123456789").unwrap();
    assert!(store.set("b", "1").is_err());
    store.remove("a").unwrap();
    store.set("b", "1").unwrap();
    assert_eq!(store.total_size().unwrap(), 2);
}
