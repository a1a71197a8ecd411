//! Durable key-value tier.
//!
//! Values are JSON strings stored under the same key shapes the website uses
//! in browser storage (`schoolSettings`, `news_1_6__false`, `newsDetailCache`,
//! `logo_<base64>` ...), so a snapshot can be inspected or seeded by hand.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::lock::mutex_lock;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage quota exceeded writing {key}: need {needed} bytes, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Persistent string storage shared by every cache.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

fn check_quota(
    key: &str,
    value: &str,
    quota: Option<usize>,
    used_by_others: usize,
) -> Result<(), StorageError> {
    if let Some(quota) = quota {
        let needed = key.len() + value.len();
        let available = quota.saturating_sub(used_by_others);
        if needed > available {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available,
            });
        }
    }
    Ok(())
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store with an optional byte quota (keys plus values).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Number of successful `set` calls, for asserting write suppression.
    pub fn write_count(&self) -> usize {
        *mutex_lock(&self.writes, "cache::storage", "write_count")
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, "cache::storage", "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(mutex_lock(&self.entries, "cache::storage", "get").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = mutex_lock(&self.entries, "cache::storage", "set");
        let used_by_others: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        check_quota(key, value, self.quota, used_by_others)?;
        entries.insert(key.to_string(), value.to_string());
        *mutex_lock(&self.writes, "cache::storage", "set") += 1;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        mutex_lock(&self.entries, "cache::storage", "remove").remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(mutex_lock(&self.entries, "cache::storage", "keys")
            .keys()
            .cloned()
            .collect())
    }
}

// ============================================================================
// File store
// ============================================================================

/// Longest escaped key used verbatim as a file name. Most filesystems stop
/// at 255 bytes and `%XX` escaping triples non-ASCII search terms.
const MAX_ESCAPED_NAME: usize = 200;

/// Prefix of hashed file names; `escape_key` never emits `~`.
const HASHED_PREFIX: char = '~';

/// One `<escaped key>.json` file per key under a cache directory.
///
/// Keys too long to escape into a file name are stored as `~<sha256>.json`
/// with the original key beside it in `~<sha256>.key`.
pub struct FileStore {
    dir: PathBuf,
    quota: Option<usize>,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, quota: None })
    }

    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }

    fn key_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.key", stem))
    }

    fn key_for_stem(&self, stem: &str) -> Result<Option<String>, StorageError> {
        if !stem.starts_with(HASHED_PREFIX) {
            return Ok(unescape_key(stem));
        }
        match fs::read_to_string(self.key_path(stem)) {
            Ok(key) => Ok(Some(key)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn used_bytes_except(&self, key: &str) -> Result<usize, StorageError> {
        let mut used = 0;
        for stored in self.keys()? {
            if stored == key {
                continue;
            }
            let len = fs::metadata(self.path_for(&stored))?.len() as usize;
            used += stored.len() + len;
        }
        Ok(used)
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.quota.is_some() {
            check_quota(key, value, self.quota, self.used_bytes_except(key)?)?;
        }

        let stem = file_stem(key);
        if stem.starts_with(HASHED_PREFIX) {
            fs::write(self.key_path(&stem), key)?;
        }

        // Write atomically via temp file
        let path = self.path_for(key);
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        let stem = file_stem(key);
        if stem.starts_with(HASHED_PREFIX) {
            let key_path = self.key_path(&stem);
            if key_path.exists() {
                fs::remove_file(key_path)?;
            }
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                if let Some(key) = self.key_for_stem(stem)? {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn file_stem(key: &str) -> String {
    let escaped = escape_key(key);
    if escaped.len() <= MAX_ESCAPED_NAME {
        return escaped;
    }
    let digest = Sha256::digest(key.as_bytes());
    format!("{}{}", HASHED_PREFIX, hex::encode(digest))
}

/// Keys may contain `/`, `+`, `=` (base64) or spaces (search terms); anything
/// outside `[A-Za-z0-9_.-]` is written as `%XX`.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' => out.push(byte as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        let key = "logo_aHR0cDovL2xvY2FsaG9zdDo4MDAwL3VwbG9hZHMvbG9nby5wbmc=";
        assert_eq!(unescape_key(&escape_key(key)).as_deref(), Some(key));

        let key = "news_1_6_ujian nasional/2024_false";
        let escaped = escape_key(key);
        assert!(!escaped.contains('/'));
        assert!(!escaped.contains(' '));
        assert_eq!(unescape_key(&escaped).as_deref(), Some(key));
    }

    #[test]
    fn test_unescape_rejects_garbage() {
        assert_eq!(unescape_key("bad%G1"), None);
        assert_eq!(unescape_key("bad%4"), None);
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(20);
        store.set("a", "0123456789").unwrap();
        let err = store.set("b", "0123456789").unwrap_err();
        assert!(err.is_quota());
        // Overwriting an existing key only counts the new value
        store.set("a", "01234567890123456").unwrap();
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cache")).unwrap();

        assert_eq!(store.get("schoolSettings").unwrap(), None);
        store.set("schoolSettings", r#"{"a":1}"#).unwrap();
        store.set("logo_abc+/=", "data").unwrap();

        assert_eq!(store.get("schoolSettings").unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(store.keys().unwrap(), vec!["logo_abc+/=".to_string(), "schoolSettings".to_string()]);

        store.remove("logo_abc+/=").unwrap();
        store.remove("missing").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["schoolSettings".to_string()]);
    }

    #[test]
    fn test_file_store_long_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let key = format!("news_1_6_{}_false", "ujian akhir semester ".repeat(20));
        let other = format!("news_1_6_{}_true", "ujian akhir semester ".repeat(20));

        store.set(&key, "[1]").unwrap();
        store.set(&other, "[2]").unwrap();
        store.set("schoolSettings", "{}").unwrap();

        assert_eq!(store.get(&key).unwrap().as_deref(), Some("[1]"));
        assert_eq!(store.get(&other).unwrap().as_deref(), Some("[2]"));
        let mut expected = vec![key.clone(), other.clone(), "schoolSettings".to_string()];
        expected.sort();
        assert_eq!(store.keys().unwrap(), expected);
        for entry in fs::read_dir(dir.path()).unwrap() {
            assert!(entry.unwrap().file_name().len() <= MAX_ESCAPED_NAME + 5);
        }

        store.remove(&key).unwrap();
        assert_eq!(store.get(&key).unwrap(), None);
        assert_eq!(store.keys().unwrap().len(), 2);
        // Only the other key's data and key files remain beside settings
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_file_store_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap().with_quota(64);
        store.set("k1", &"x".repeat(40)).unwrap();
        assert!(store.set("k2", &"y".repeat(40)).unwrap_err().is_quota());
        assert_eq!(store.get("k2").unwrap(), None);
    }
}
