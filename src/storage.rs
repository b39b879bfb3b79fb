//! Key/value storage standing in for browser `localStorage`.
//!
//! SYSTEM CONTEXT
//! ==============
//! The auth provider persists its session here, and a forced local logout
//! wipes every key under [`AUTH_KEY_PREFIX`]. [`MemoryStorage`] backs tests
//! and embedded use; [`FileStorage`] keeps the CLI signed in across runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Prefix shared by every key the auth provider writes.
pub const AUTH_KEY_PREFIX: &str = "supabase.auth";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed for {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("storage file {path} is not valid JSON: {source}")]
    Corrupt { path: PathBuf, source: serde_json::Error },
}

/// Synchronous string storage, matching the `localStorage` contract.
///
/// Writes are best effort: implementations log and swallow persistence
/// failures the same way a browser quota error is ignored by callers.
pub trait KeyValueStorage: Send + Sync {
    fn keys(&self) -> Vec<String>;
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// Remove every auth key from `storage`, returning how many were removed.
pub fn clear_auth_keys(storage: &dyn KeyValueStorage) -> usize {
    let keys: Vec<String> = storage
        .keys()
        .into_iter()
        .filter(|key| key.starts_with(AUTH_KEY_PREFIX))
        .collect();
    for key in &keys {
        storage.remove_item(key);
    }
    keys.len()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn keys(&self) -> Vec<String> {
        lock(&self.items).keys().cloned().collect()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        lock(&self.items).insert(key.to_owned(), value.to_owned());
    }

    fn remove_item(&self, key: &str) {
        lock(&self.items).remove(key);
    }
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// JSON-object file storage. The whole map is rewritten on every mutation.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let items = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt { path: path.clone(), source })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        Ok(Self { path, items: Mutex::new(items) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, items: &BTreeMap<String, String>) {
        let result = serde_json::to_string_pretty(items)
            .map_err(std::io::Error::other)
            .and_then(|raw| std::fs::write(&self.path, raw));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to persist storage file");
        }
    }
}

impl KeyValueStorage for FileStorage {
    fn keys(&self) -> Vec<String> {
        lock(&self.items).keys().cloned().collect()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let mut items = lock(&self.items);
        items.insert(key.to_owned(), value.to_owned());
        self.flush(&items);
    }

    fn remove_item(&self, key: &str) {
        let mut items = lock(&self.items);
        if items.remove(key).is_some() {
            self.flush(&items);
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
