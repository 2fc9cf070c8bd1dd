//! Local snapshot persistence.
//!
//! A [`SnapshotStore`] is a small named-slot string store used for the
//! persisted session snapshot. It is local, synchronous, and survives
//! process restarts when backed by the filesystem; only the session
//! lifecycle writes or clears the session slot.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Errors from snapshot storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Durable key-value slots scoped to this client.
pub trait SnapshotStore: Send + Sync {
    /// Write `value` into `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the slot cannot be written.
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the slot cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Clear `key`. Clearing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the slot cannot be cleared.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store; state dies with the process.
///
/// The default for tests and for embedders that handle persistence
/// themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("store entries poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().expect("store entries poisoned");
        Ok(entries.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("store entries poisoned");
        entries.remove(key);
        Ok(())
    }
}

/// Filesystem-backed store: one file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created lazily
    /// on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory this store writes under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl SnapshotStore for FileStore {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
