use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use directories::ProjectDirs;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::error::StorageError;

/// Well-known key under which the access token is stored.
pub const ACCESS_TOKEN_KEY: &str = "access-token";

/// External credential-storage collaborator.
pub trait CredentialStore: Send + Sync {
    /// Persists `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Deletes the value stored under `key`; missing keys count as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// File-backed store under the platform config directory.
///
/// Each key is one file: the credential on the first line, the RFC 3339
/// stored-at timestamp on the second.
#[derive(Debug)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Opens the store in the platform-appropriate config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no config directory can be resolved.
    pub fn open() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("", "", "blelink").ok_or(StorageError::NoStoreDirectory)?;
        Ok(Self {
            dir: dirs.config_dir().to_path_buf(),
        })
    }

    /// Opens the store rooted at an explicit directory.
    #[must_use]
    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl CredentialStore for FileCredentialStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io { source })?;
        let stored_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("-"));
        fs::write(self.path_for(key), format!("{value}\n{stored_at}\n"))
            .map_err(|source| StorageError::Io { source })
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|source| StorageError::Io { source })?;
        let value = contents.lines().next().unwrap_or_default().trim();
        if value.is_empty() {
            debug!(?path, "ignoring empty credential record");
            return Ok(None);
        }
        Ok(Some(value.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { source }),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with one entry.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn file_store_round_trips_a_token() {
        let dir = std::env::temp_dir().join(format!("blelink-store-{}", std::process::id()));
        let store = FileCredentialStore::at(dir.clone());

        store.set(ACCESS_TOKEN_KEY, "T1").expect("set should work");
        assert_eq!(
            Some("T1".to_string()),
            store.get(ACCESS_TOKEN_KEY).expect("get should work")
        );

        store.delete(ACCESS_TOKEN_KEY).expect("delete should work");
        assert_eq!(None, store.get(ACCESS_TOKEN_KEY).expect("get should work"));
        // Deleting a missing key is still a success.
        store.delete(ACCESS_TOKEN_KEY).expect("delete is idempotent");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn memory_store_round_trips_a_token() {
        let store = MemoryCredentialStore::new();
        store.set(ACCESS_TOKEN_KEY, "T1").expect("set should work");
        assert_eq!(
            Some("T1".to_string()),
            store.get(ACCESS_TOKEN_KEY).expect("get should work")
        );
        store.delete(ACCESS_TOKEN_KEY).expect("delete should work");
        assert_eq!(None, store.get(ACCESS_TOKEN_KEY).expect("get should work"));
    }
}
