//! Durable storage for the session token.
//!
//! Every adapter is a plain string key/value store. The session store only
//! ever uses [`TOKEN_KEY`], but the adapters do not know that.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;
use tracing::{debug, warn};

/// Key the bearer token is stored under
pub const TOKEN_KEY: &str = "token_sk";

/// Keychain service name
const SERVICE_NAME: &str = "sukimoko-admin";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse session file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Keychain did not retain the value for {0}")]
    NotRetained(String),

    #[error("Session storage lock poisoned")]
    Poisoned,
}

/// Persistence adapter behind the session store.
pub trait TokenStorage: Send + Sync {
    /// Read the value under `key`, `None` if it was never set or was cleared
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn clear(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// JSON file holding a flat key/value map.
///
/// The file is removed once its last key is cleared, so a logged-out
/// client leaves nothing behind on disk.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileTokenStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Map for a read-modify-write. A damaged file is replaced rather than
    /// blocking every later write.
    fn read_map_for_update(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.read_map() {
            Err(StorageError::Parse(e)) => {
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable session file");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if map.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
                debug!(path = %self.path.display(), "Removed empty session file");
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(map)?;
        // Write aside and rename so an interrupted write never leaves a partial file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStorage for FileTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut map = self.read_map_for_update()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn clear(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(StorageError::Parse(e)) => {
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable session file");
                return self.write_map(&BTreeMap::new());
            }
            Err(e) => return Err(e),
        };
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(&map)
    }
}

/// OS keychain storage, one keychain entry per key.
///
/// Writes are read back through a fresh entry. A keychain that silently
/// drops values (no platform store available) fails the write instead.
#[derive(Debug, Default)]
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    pub fn new() -> Self {
        Self
    }
}

impl TokenStorage for KeyringTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entry = Entry::new(SERVICE_NAME, key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Entry::new(SERVICE_NAME, key)?.set_password(value)?;
        if self.get(key)?.as_deref() != Some(value) {
            return Err(StorageError::NotRetained(key.to_string()));
        }
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StorageError> {
        let entry = Entry::new(SERVICE_NAME, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) fn temp_session_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("sukimoko-admin-{}-{}", std::process::id(), name))
        .join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_set_get_clear() {
        let storage = MemoryTokenStorage::new();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);

        storage.set(TOKEN_KEY, "abc").unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));

        storage.set(TOKEN_KEY, "def").unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("def"));

        storage.clear(TOKEN_KEY).unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);

        // Clearing twice is fine
        storage.clear(TOKEN_KEY).unwrap();
    }

    #[test]
    fn test_file_storage_survives_new_instance() {
        let path = temp_session_path("file-restart");
        let first = FileTokenStorage::new(path.clone());
        first.set(TOKEN_KEY, "persisted").unwrap();

        let second = FileTokenStorage::new(path.clone());
        assert_eq!(second.get(TOKEN_KEY).unwrap().as_deref(), Some("persisted"));

        second.clear(TOKEN_KEY).unwrap();
        assert!(!path.exists());
        assert_eq!(first.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_storage_keeps_other_keys() {
        let path = temp_session_path("file-other-keys");
        let storage = FileTokenStorage::new(path.clone());
        storage.set("other", "x").unwrap();
        storage.set(TOKEN_KEY, "t").unwrap();

        storage.clear(TOKEN_KEY).unwrap();
        assert!(path.exists());
        assert_eq!(storage.get("other").unwrap().as_deref(), Some("x"));

        storage.clear("other").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_storage_missing_file_reads_as_empty() {
        let storage = FileTokenStorage::new(temp_session_path("file-missing"));
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        storage.clear(TOKEN_KEY).unwrap();
    }

    #[test]
    fn test_file_storage_recovers_from_truncated_file() {
        let path = temp_session_path("file-truncated");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"token_sk": "abc"#).unwrap();

        let storage = FileTokenStorage::new(path.clone());
        storage.set(TOKEN_KEY, "fresh").unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("fresh"));
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::write(&path, r#"{"token_sk": "abc"#).unwrap();
        storage.clear(TOKEN_KEY).unwrap();
        assert!(!path.exists());
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_keyring_value_visible_to_new_instance() {
        let key = format!("test-{}", std::process::id());
        match KeyringTokenStorage::new().set(&key, "persisted") {
            Ok(()) => {
                let fresh = KeyringTokenStorage::new();
                assert_eq!(fresh.get(&key).unwrap().as_deref(), Some("persisted"));
                fresh.clear(&key).unwrap();
                assert_eq!(KeyringTokenStorage::new().get(&key).unwrap(), None);
            }
            // No usable keychain here; the write must say so
            Err(e) => assert!(matches!(e, StorageError::Keyring(_) | StorageError::NotRetained(_))),
        }
    }

    #[test]
    fn test_file_storage_corrupt_file_is_an_error() {
        let path = temp_session_path("file-corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let storage = FileTokenStorage::new(path.clone());
        assert!(matches!(storage.get(TOKEN_KEY), Err(StorageError::Parse(_))));

        std::fs::remove_file(path).unwrap();
    }
}
