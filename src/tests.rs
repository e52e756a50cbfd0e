//! Cross-module tests for the store, engine, and buffer working together.

use super::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn open_store(name: &str, base: &Path) -> EncryptedStore {
    EncryptedStore::open(name, base, Box::new(AgeEngine::new())).unwrap()
}

fn ciphertext_objects(dir: &Path) -> Vec<std::path::PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("age"))
        .collect()
}

/// Engine test double that refuses every operation.
struct FailingEngine;

impl EncryptionEngine for FailingEngine {
    fn cipher(&self) -> &'static str {
        "refuse-all"
    }

    fn seal(&self, _: &[u8], _: &[u8], _: &Path) -> Result<(), StashError> {
        Err(StashError::Parse("engine refused to seal".to_string()))
    }

    fn unseal(&self, _: &Path, _: &[u8]) -> Result<Vec<u8>, StashError> {
        Err(StashError::Parse("engine refused to unseal".to_string()))
    }
}

#[test]
fn test_open_creates_backing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store("vault", temp_dir.path());

    let path = temp_dir.path().join("vault");
    assert!(path.is_dir());
    assert_eq!(store.path(), path);
    assert_eq!(store.cipher(), "age-v1");
    assert!(store.is_empty());
}

#[test]
fn test_set_get_roundtrip_destroys_source() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());

    let value = SecureBuffer::from("correct horse battery staple");
    let view = value.clone();
    store.set("passphrase", value).unwrap();

    // Ownership transfer: the caller's value was consumed
    assert_eq!(view.len(), 0);
    assert!(store.contains_key("passphrase"));

    let restored = store.get("passphrase").unwrap().unwrap();
    assert_eq!(restored, "correct horse battery staple");
}

#[test]
fn test_get_absent_key_is_none() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());
    assert!(store.get("missing").unwrap().is_none());
}

#[test]
fn test_each_entry_is_one_ciphertext_object() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());

    store.set("a", SecureBuffer::from("1")).unwrap();
    store.set("b", SecureBuffer::from("2")).unwrap();

    let objects = ciphertext_objects(store.path());
    assert_eq!(objects.len(), 2);

    // Locations are random identifiers, not derived from key names
    let location = store.location_of("a").unwrap();
    let stem = location.file_stem().unwrap().to_str().unwrap();
    assert_ne!(stem, "a");
    assert_eq!(stem.len(), 32);
}

#[test]
fn test_overwrite_retires_old_object() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());

    store.set("k", SecureBuffer::from("old")).unwrap();
    let old_location = store.location_of("k").unwrap().to_path_buf();

    store.set("k", SecureBuffer::from("new")).unwrap();
    assert!(!old_location.exists());
    assert_eq!(ciphertext_objects(store.path()).len(), 1);

    let restored = store.get("k").unwrap().unwrap();
    assert_eq!(restored, "new");
}

#[test]
fn test_delete_removes_object_and_wipes_cache() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());

    store.set("k", SecureBuffer::from("value")).unwrap();
    let first_read = store.get("k").unwrap().unwrap();
    let second_read = store.get("k").unwrap().unwrap();
    let location = store.location_of("k").unwrap().to_path_buf();

    store.delete("k").unwrap();

    assert!(!location.exists());
    assert!(store.get("k").unwrap().is_none());
    // Every cached decrypted fragment was wiped, including retained handles
    assert_eq!(first_read.len(), 0);
    assert_eq!(second_read.len(), 0);
}

#[test]
fn test_delete_absent_key_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());
    store.delete("missing").unwrap();
}

#[test]
fn test_set_from_reader() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());

    let mut source: &[u8] = b"streamed secret";
    store.set_from_reader("k", &mut source).unwrap();

    let restored = store.get("k").unwrap().unwrap();
    assert_eq!(restored, "streamed secret");
}

#[test]
fn test_seal_failure_leaves_index_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = EncryptedStore::open("vault", temp_dir.path(), Box::new(FailingEngine)).unwrap();

    let value = SecureBuffer::from("secret");
    let view = value.clone();
    assert!(store.set("k", value).is_err());

    assert!(!store.contains_key("k"));
    assert!(ciphertext_objects(store.path()).is_empty());
    // Key material was wiped and the value still consumed
    assert_eq!(view.len(), 0);
}

#[test]
fn test_destroy_removes_directory_and_all_objects() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());

    store.set("a", SecureBuffer::from("1")).unwrap();
    store.set("b", SecureBuffer::from("2")).unwrap();
    store.set("c", SecureBuffer::from("3")).unwrap();
    let cached = store.get("b").unwrap().unwrap();
    let locations: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|k| store.location_of(k).unwrap().to_path_buf())
        .collect();

    store.destroy().unwrap();

    assert!(!temp_dir.path().join("vault").exists());
    for location in &locations {
        assert!(!location.exists());
    }
    assert_eq!(cached.len(), 0);

    // Terminal: all further operations are rejected
    assert!(matches!(
        store.get("a").unwrap_err(),
        StashError::StoreClosed(_)
    ));
    assert!(matches!(
        store.set("a", SecureBuffer::from("x")).unwrap_err(),
        StashError::StoreClosed(_)
    ));
    assert!(matches!(
        store.delete("a").unwrap_err(),
        StashError::StoreClosed(_)
    ));

    // Double destroy is safe
    store.destroy().unwrap();
}

#[test]
fn test_store_keys_listing() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());

    store.set("alpha", SecureBuffer::from("1")).unwrap();
    store.set("beta", SecureBuffer::from("2")).unwrap();

    let mut keys: Vec<&str> = store.keys().collect();
    keys.sort_unstable();
    assert_eq!(keys, ["alpha", "beta"]);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_reopen_sees_no_stale_index() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());

    store.set("a", SecureBuffer::from("1")).unwrap();
    store.set("b", SecureBuffer::from("2")).unwrap();
    let dir = store.path().to_path_buf();
    drop(store);

    // Ciphertext objects survive the first store handle
    assert_eq!(ciphertext_objects(&dir).len(), 2);

    // A second store over the same directory starts from an empty index
    // with fresh key material; the orphaned objects stay on disk
    let mut reopened = open_store("vault", temp_dir.path());
    assert!(reopened.is_empty());
    assert!(!reopened.contains_key("a"));
    assert!(reopened.get("a").unwrap().is_none());
    assert_eq!(ciphertext_objects(&dir).len(), 2);
}

#[test]
fn test_store_debug_is_redacted() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());
    store.set("api-token", SecureBuffer::from("hunter2")).unwrap();

    let rendered = format!("{:?}", store);
    assert!(rendered.contains("1 entries"));
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("api-token"));
}

#[test]
fn test_open_rejects_file_in_place_of_directory() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("vault"), b"not a dir").unwrap();

    let result = EncryptedStore::open("vault", temp_dir.path(), Box::new(AgeEngine::new()));
    assert!(matches!(result.unwrap_err(), StashError::InvalidPath(_)));
}

#[test]
fn test_binary_values_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = open_store("vault", temp_dir.path());

    let raw: Vec<u8> = (0u8..=255).collect();
    store.set("bytes", SecureBuffer::from(raw.clone())).unwrap();

    let restored = store.get("bytes").unwrap().unwrap();
    assert_eq!(restored, &raw[..]);
}
