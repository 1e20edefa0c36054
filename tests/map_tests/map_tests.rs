//! Tests for the value log and the unique map built on the ordered index
//!
//! These tests verify:
//! - Value log append / read, record counting on reopen
//! - CRC and truncation detection in the value log
//! - Unique map insert / put / get / remove / range semantics
//! - Map persistence through Config-driven file storage

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use blockindex::config::SyncStrategy;
use blockindex::map::ValueLog;
use blockindex::{Config, FileStorage, FixedBytes, IndexError, MemoryStorage, UniqueMap};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

type Name = FixedBytes<16>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    owner: String,
    balance: i64,
    tags: Vec<String>,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn name(s: &str) -> Name {
    Name::try_from(s).unwrap()
}

fn account(owner: &str, balance: i64) -> Account {
    Account {
        owner: owner.to_string(),
        balance,
        tags: vec!["checking".to_string()],
    }
}

fn memory_map() -> UniqueMap<Name, Account, MemoryStorage> {
    UniqueMap::with_storage(MemoryStorage::new(), MemoryStorage::new()).unwrap()
}

fn open_log(path: &Path) -> blockindex::Result<ValueLog<String, FileStorage>> {
    ValueLog::open(FileStorage::open(path, SyncStrategy::OnClose)?)
}

/// Log file holding the given values, closed again
fn write_log(dir: &TempDir, values: &[&str]) -> (PathBuf, Vec<u64>) {
    let path = dir.path().join("values.val");
    let mut log = open_log(&path).unwrap();
    let offsets = values
        .iter()
        .map(|value| log.append(&value.to_string()).unwrap())
        .collect();
    (path, offsets)
}

// =============================================================================
// ValueLog Tests
// =============================================================================

#[test]
fn test_log_append_and_read() {
    let mut log = ValueLog::<Account, _>::open(MemoryStorage::new()).unwrap();
    assert!(log.is_empty());

    let first = log.append(&account("alice", 10)).unwrap();
    let second = log.append(&account("bob", -5)).unwrap();

    assert_eq!(first, 8);
    assert!(second > first);
    assert_eq!(log.len(), 2);
    assert_eq!(log.read(second).unwrap(), account("bob", -5));
    assert_eq!(log.read(first).unwrap(), account("alice", 10));
}

#[test]
fn test_log_reopen_counts_records() {
    let temp = setup_temp_dir();
    let (path, offsets) = write_log(&temp, &["one", "two", "three"]);

    let mut log = open_log(&path).unwrap();

    assert_eq!(log.len(), 3);
    assert_eq!(log.read(offsets[1]).unwrap(), "two");

    let fourth = log.append(&"four".to_string()).unwrap();
    assert_eq!(log.read(fourth).unwrap(), "four");
}

#[test]
fn test_log_read_inside_header_fails() {
    let mut log = ValueLog::<String, _>::open(MemoryStorage::new()).unwrap();
    log.append(&"x".to_string()).unwrap();

    let result = log.read(4);
    assert!(matches!(result, Err(IndexError::InvalidOffset { offset: 4, .. })));
}

#[test]
fn test_log_detects_flipped_byte() {
    let temp = setup_temp_dir();
    let (path, offsets) = write_log(&temp, &["precious data"]);

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let mut log = open_log(&path).unwrap();
    let result = log.read(offsets[0]);
    assert!(matches!(result, Err(IndexError::ValueLogCorruption(_))));
}

#[test]
fn test_log_detects_truncated_record() {
    let temp = setup_temp_dir();
    let (path, _) = write_log(&temp, &["first", "second"]);

    let len = fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 3).unwrap();
    drop(file);

    let result = open_log(&path);
    assert!(matches!(result, Err(IndexError::ValueLogCorruption(_))));
}

#[test]
fn test_log_rejects_foreign_file() {
    let temp = setup_temp_dir();
    let path = temp.path().join("foreign.val");
    fs::write(&path, b"NOTALOG!").unwrap();

    let result = open_log(&path);
    assert!(matches!(result, Err(IndexError::Format(_))));
}

// =============================================================================
// UniqueMap Tests
// =============================================================================

#[test]
fn test_map_insert_and_get() {
    let mut map = memory_map();

    assert!(map.insert(&name("alice"), &account("alice", 100)).unwrap());
    assert!(map.insert(&name("bob"), &account("bob", 50)).unwrap());

    assert_eq!(map.get(&name("alice")).unwrap(), Some(account("alice", 100)));
    assert_eq!(map.get(&name("bob")).unwrap(), Some(account("bob", 50)));
    assert_eq!(map.get(&name("carol")).unwrap(), None);
    assert!(map.contains_key(&name("bob")).unwrap());
}

#[test]
fn test_map_insert_existing_key_writes_nothing() {
    let mut map = memory_map();
    map.insert(&name("alice"), &account("alice", 100)).unwrap();

    assert!(!map.insert(&name("alice"), &account("mallory", 0)).unwrap());

    assert_eq!(map.value_count(), 1);
    assert_eq!(map.get(&name("alice")).unwrap(), Some(account("alice", 100)));
}

#[test]
fn test_map_put_overwrites() {
    let mut map = memory_map();

    assert!(!map.put(&name("alice"), &account("alice", 1)).unwrap());
    assert!(map.put(&name("alice"), &account("alice", 2)).unwrap());

    assert_eq!(map.get(&name("alice")).unwrap(), Some(account("alice", 2)));
    assert_eq!(map.value_count(), 2);
    assert_eq!(map.verify().unwrap().entries, 1);
}

#[test]
fn test_map_remove() {
    let mut map = memory_map();
    map.insert(&name("alice"), &account("alice", 1)).unwrap();

    assert!(map.remove(&name("alice")).unwrap());
    assert!(!map.remove(&name("alice")).unwrap());
    assert_eq!(map.get(&name("alice")).unwrap(), None);

    // A removed key can be inserted again
    assert!(map.insert(&name("alice"), &account("alice", 3)).unwrap());
    assert_eq!(map.get(&name("alice")).unwrap(), Some(account("alice", 3)));
}

#[test]
fn test_map_range() {
    let mut map = memory_map();
    for (i, owner) in ["dave", "alice", "erin", "bob", "carol"].iter().enumerate() {
        map.insert(&name(owner), &account(owner, i as i64)).unwrap();
    }

    let pairs = map.range(&name("b"), &name("d")).unwrap();
    let owners: Vec<String> = pairs.iter().map(|(key, _)| key.to_string()).collect();
    assert_eq!(owners, vec!["bob", "carol"]);
    assert_eq!(pairs[0].1, account("bob", 3));
}

#[test]
fn test_map_many_keys() {
    let mut map = UniqueMap::<u64, String, MemoryStorage>::with_storage(MemoryStorage::new(), MemoryStorage::new()).unwrap();

    for key in (0..1000u64).rev() {
        map.insert(&key, &format!("value-{}", key)).unwrap();
    }
    for key in (0..1000u64).step_by(2) {
        map.remove(&key).unwrap();
    }

    assert_eq!(map.get(&501).unwrap(), Some("value-501".to_string()));
    assert_eq!(map.get(&500).unwrap(), None);
    assert_eq!(map.range(&0, &u64::MAX).unwrap().len(), 500);
    assert_eq!(map.verify().unwrap().entries, 500);
}

#[test]
fn test_map_reopen_from_config() {
    let temp = setup_temp_dir();
    let config = Config::builder().data_dir(temp.path()).build();

    {
        let mut map = UniqueMap::<Name, Account, _>::open(&config, "accounts").unwrap();
        map.insert(&name("alice"), &account("alice", 7)).unwrap();
        map.put(&name("bob"), &account("bob", 8)).unwrap();
        map.put(&name("bob"), &account("bob", 9)).unwrap();
        map.sync().unwrap();
    }

    assert!(temp.path().join("accounts.idx").exists());
    assert!(temp.path().join("accounts.val").exists());

    let mut map = UniqueMap::<Name, Account, _>::open(&config, "accounts").unwrap();
    assert_eq!(map.get(&name("alice")).unwrap(), Some(account("alice", 7)));
    assert_eq!(map.get(&name("bob")).unwrap(), Some(account("bob", 9)));
    assert_eq!(map.value_count(), 3);
}

#[test]
fn test_map_in_memory_config() {
    let config = Config::builder().in_memory().build();

    let mut map = UniqueMap::<u64, String, _>::open(&config, "scratch").unwrap();
    map.insert(&1, &"one".to_string()).unwrap();

    assert_eq!(map.get(&1).unwrap(), Some("one".to_string()));
}
