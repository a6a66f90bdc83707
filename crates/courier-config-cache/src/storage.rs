//! Key/value storage backends for the configuration cache.
//!
//! Backends store text and integer slots. The cache always writes a value and
//! its timestamp through [`StorageBackend::write_string_and_i64`] and reads
//! them back through [`StorageBackend::read_string_and_i64`], so a reader
//! never sees one slot of a pair without the other.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tempfile::NamedTempFile;

/// Storage errors. The cache swallows all of them.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("slot '{key}' does not hold {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// A stored slot value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Integer(i64),
    Text(String),
}

/// Backing store for [`ConfigurationCache`](crate::ConfigurationCache).
pub trait StorageBackend: Send + Sync {
    /// Whether `key` holds any value.
    fn contains_key(&self, key: &str) -> Result<bool, StorageError>;

    /// Read a text slot and an integer slot under one lock.
    fn read_string_and_i64(
        &self,
        string_key: &str,
        i64_key: &str,
    ) -> Result<(Option<String>, Option<i64>), StorageError>;

    /// Write a text slot and an integer slot as one unit.
    fn write_string_and_i64(
        &self,
        string_key: &str,
        string_value: &str,
        i64_key: &str,
        i64_value: i64,
    ) -> Result<(), StorageError>;

    /// Remove `key` if present.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

type Slots = HashMap<String, StoredValue>;

fn read_pair(
    slots: &Slots,
    string_key: &str,
    i64_key: &str,
) -> Result<(Option<String>, Option<i64>), StorageError> {
    let text = match slots.get(string_key) {
        None => None,
        Some(StoredValue::Text(text)) => Some(text.clone()),
        Some(StoredValue::Integer(_)) => {
            return Err(StorageError::TypeMismatch {
                key: string_key.to_string(),
                expected: "text",
            })
        }
    };
    let integer = match slots.get(i64_key) {
        None => None,
        Some(StoredValue::Integer(value)) => Some(*value),
        Some(StoredValue::Text(_)) => {
            return Err(StorageError::TypeMismatch {
                key: i64_key.to_string(),
                expected: "an integer",
            })
        }
    };
    Ok((text, integer))
}

fn write_pair(slots: &mut Slots, string_key: &str, string_value: &str, i64_key: &str, i64_value: i64) {
    slots.insert(string_key.to_string(), StoredValue::Text(string_value.to_string()));
    slots.insert(i64_key.to_string(), StoredValue::Integer(i64_value));
}

/// Process-local storage.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    slots: RwLock<Slots>,
}

impl InMemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Slots>, StorageError> {
        self.slots.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Slots>, StorageError> {
        self.slots.write().map_err(|_| StorageError::Poisoned)
    }
}

impl StorageBackend for InMemoryStorage {
    fn contains_key(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.read()?.contains_key(key))
    }

    fn read_string_and_i64(
        &self,
        string_key: &str,
        i64_key: &str,
    ) -> Result<(Option<String>, Option<i64>), StorageError> {
        let slots = self.read()?;
        read_pair(&slots, string_key, i64_key)
    }

    fn write_string_and_i64(
        &self,
        string_key: &str,
        string_value: &str,
        i64_key: &str,
        i64_value: i64,
    ) -> Result<(), StorageError> {
        write_pair(&mut *self.write()?, string_key, string_value, i64_key, i64_value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.write()?.remove(key);
        Ok(())
    }
}

/// Storage persisted as one JSON document.
///
/// The file is read on first access. Every write lands in a uniquely named
/// sibling temp file that is persisted over the original, so the file on disk
/// always holds a complete snapshot. A file that does not parse reads as an
/// error and is replaced by the next write.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    slots: RwLock<Option<Slots>>,
}

impl FileStorage {
    /// Storage backed by the file at `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            slots: RwLock::new(None),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Slots, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Slots::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, slots: &Slots) -> Result<(), StorageError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&serde_json::to_vec(slots)?)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn with_slots<T>(&self, f: impl FnOnce(&Slots) -> Result<T, StorageError>) -> Result<T, StorageError> {
        {
            let guard = self.slots.read().map_err(|_| StorageError::Poisoned)?;
            if let Some(slots) = guard.as_ref() {
                return f(slots);
            }
        }
        let mut guard = self.slots.write().map_err(|_| StorageError::Poisoned)?;
        let slots = match guard.take() {
            Some(slots) => slots,
            None => self.load()?,
        };
        f(guard.insert(slots))
    }

    fn update(&self, f: impl FnOnce(&mut Slots)) -> Result<(), StorageError> {
        let mut guard = self.slots.write().map_err(|_| StorageError::Poisoned)?;
        let mut next = match guard.take() {
            Some(slots) => slots,
            None => match self.load() {
                Ok(slots) => slots,
                Err(StorageError::Serialization(e)) => {
                    tracing::debug!(
                        path = %self.path.display(),
                        error = %e,
                        "replacing unreadable cache file"
                    );
                    Slots::new()
                }
                Err(e) => return Err(e),
            },
        };
        let previous = next.clone();
        f(&mut next);

        match self.persist(&next) {
            Ok(()) => {
                *guard = Some(next);
                Ok(())
            }
            Err(e) => {
                *guard = Some(previous);
                Err(e)
            }
        }
    }
}

impl StorageBackend for FileStorage {
    fn contains_key(&self, key: &str) -> Result<bool, StorageError> {
        self.with_slots(|slots| Ok(slots.contains_key(key)))
    }

    fn read_string_and_i64(
        &self,
        string_key: &str,
        i64_key: &str,
    ) -> Result<(Option<String>, Option<i64>), StorageError> {
        self.with_slots(|slots| read_pair(slots, string_key, i64_key))
    }

    fn write_string_and_i64(
        &self,
        string_key: &str,
        string_value: &str,
        i64_key: &str,
        i64_value: i64,
    ) -> Result<(), StorageError> {
        self.update(|slots| write_pair(slots, string_key, string_value, i64_key, i64_value))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|slots| {
            slots.remove(key);
        })
    }
}
