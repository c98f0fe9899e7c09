//! Durable storage backends for the session credential
//!
//! The session token is a single string under a well-known location,
//! readable across restarts and removed on logout. Backends only move
//! that string; expiry bookkeeping lives in
//! [`SessionTokenStore`](crate::store::SessionTokenStore).

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no usable data directory for this platform")]
    NoDataDir,
}

pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn store(&self, token: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory backend for tests and sessions that should not outlive the
/// process.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .token
            .read()
            .expect("Failed to acquire token storage lock")
            .clone())
    }

    fn store(&self, token: &str) -> Result<(), StorageError> {
        *self
            .token
            .write()
            .expect("Failed to acquire token storage lock") = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self
            .token
            .write()
            .expect("Failed to acquire token storage lock") = None;
        Ok(())
    }
}

/// File backend keeping the token at a fixed path so the session
/// survives restarts.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Per-user default location, e.g. `~/.local/share/hakiyetu/session-token`
    /// on Linux.
    pub fn default_location() -> Result<Self, StorageError> {
        let dirs = directories::ProjectDirs::from("ke.co", "Haki Yetu", "hakiyetu")
            .ok_or(StorageError::NoDataDir)?;
        Ok(Self {
            path: dirs.data_dir().join("session-token"),
        })
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token.to_string()))
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn store(&self, token: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

// Mock implementation for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub TokenStorage {}

        impl TokenStorage for TokenStorage {
            fn load(&self) -> Result<Option<String>, StorageError>;
            fn store(&self, token: &str) -> Result<(), StorageError>;
            fn clear(&self) -> Result<(), StorageError>;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_round_trip() {
        let storage = MemoryTokenStorage::new();
        assert_eq!(storage.load().unwrap(), None);

        storage.store("abc").unwrap();
        assert_eq!(storage.load().unwrap(), Some("abc".to_string()));

        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-token");
        let storage = FileTokenStorage::new(&path);

        assert_eq!(storage.load().unwrap(), None);
        storage.store("abc").unwrap();
        assert_eq!(storage.load().unwrap(), Some("abc".to_string()));

        // A second instance sees the same token.
        let other = FileTokenStorage::new(&path);
        assert_eq!(other.load().unwrap(), Some("abc".to_string()));

        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn file_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("session-token"));
        storage.clear().unwrap();
        storage.clear().unwrap();
    }

    #[test]
    fn file_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("nested/deeper/session-token"));
        storage.store("abc").unwrap();
        assert_eq!(storage.load().unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn file_treats_blank_content_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-token");
        fs::write(&path, "  \n").unwrap();
        let storage = FileTokenStorage::new(&path);
        assert_eq!(storage.load().unwrap(), None);
    }
}
