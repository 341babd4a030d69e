//! Key-value backends
//!
//! The gateway talks to a `KeyValueStore` capability rather than an ambient
//! global, so persistence can be faked in tests. The on-disk backend keeps
//! one file per entry under the platform data directory.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::constants::storage;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store is out of space. Distinguished from generic
    /// failures so the UI can show a quota warning.
    #[error("storage full")]
    Full,

    #[error("storage i/o: {0}")]
    Io(#[from] io::Error),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Injected read/write capability for named entries
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// On-disk backend: one `<key>.json` file per entry
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store rooted at the platform data directory
    pub fn open_default() -> Self {
        let mut root = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        root.push(storage::APP_DIR);
        Self { root }
    }

    /// Store rooted at an explicit directory (tests, portable installs)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            // No entry yet is a normal condition, not an error
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(write_error)?;
        fs::write(self.entry_path(key), value).map_err(write_error)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_error(e: io::Error) -> StorageError {
    match e.kind() {
        io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => StorageError::Full,
        _ => StorageError::Io(e),
    }
}

/// In-memory backend for tests, with an optional byte quota so the
/// storage-full path can be exercised deterministically.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: std::collections::HashMap<String, String>,
    quota_bytes: Option<usize>,
}

#[cfg(test)]
impl MemoryStore {
    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            if self.used_bytes_excluding(key) + value.len() > quota {
                return Err(StorageError::Full);
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Cloneable handle over a [`MemoryStore`]: one clone goes into the
/// gateway, the other stays with the test for seeding and inspection.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct SharedMemoryStore(std::rc::Rc<std::cell::RefCell<MemoryStore>>);

#[cfg(test)]
impl SharedMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.0
            .borrow_mut()
            .entries
            .insert(key.to_string(), value.to_string());
    }

    pub fn entry(&self, key: &str) -> Option<String> {
        self.0.borrow().entries.get(key).cloned()
    }

    pub fn set_quota(&self, bytes: Option<usize>) {
        self.0.borrow_mut().quota_bytes = bytes;
    }
}

#[cfg(test)]
impl KeyValueStore for SharedMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.borrow().get(key)
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().put(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().remove(key)
    }
}
