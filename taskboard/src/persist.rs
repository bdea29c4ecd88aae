//! Persisted filter state.
//!
//! The board's [`TaskFiltersState`] lives in a plain key-value store as an
//! opaque JSON blob under [`FILTERS_KEY`]. It is read once at startup and
//! written back on confirmed changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use taskboard_proto::codec::{CodecError, decode_filters, encode_filters};
use taskboard_proto::filters::TaskFiltersState;

/// Key the filter blob is stored under.
pub const FILTERS_KEY: &str = "taskboard.filters";

/// Errors from a [`FilterStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store file {path}: {source}")]
    Io {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings.
    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The filter state could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// String key-value store.
pub trait FilterStore: Send + Sync {
    /// Returns the value under `key`, if any.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<T: FilterStore + ?Sized> FilterStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

impl<T: FilterStore + ?Sized> FilterStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

/// Store kept in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryFilterStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl InMemoryFilterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FilterStore for InMemoryFilterStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a JSON object in a single file.
///
/// The file is created on first write, parent directories included. A
/// missing file reads as empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Creates a store over `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Default location: `<data_dir>/taskboard/filters.json`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("taskboard").join("filters.json"))
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl FilterStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let contents = serde_json::to_string_pretty(&values)?;
        std::fs::write(&self.path, contents).map_err(|e| self.io_error(e))
    }
}

/// Reads and writes the filter blob through a [`FilterStore`].
pub struct FilterPersistence<St> {
    store: St,
}

impl<St: FilterStore> FilterPersistence<St> {
    /// Wraps `store`.
    pub const fn new(store: St) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub const fn store(&self) -> &St {
        &self.store
    }

    /// Reads the stored filters.
    ///
    /// A missing blob yields the defaults. An unreadable or undecodable one
    /// also yields the defaults, with a warning; it is overwritten by the
    /// next save.
    pub fn load(&self) -> TaskFiltersState {
        let blob = match self.store.get(FILTERS_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return TaskFiltersState::default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored filters, using defaults");
                return TaskFiltersState::default();
            }
        };
        decode_filters(&blob).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored filters are invalid, using defaults");
            TaskFiltersState::default()
        })
    }

    /// Writes `filters`.
    ///
    /// # Errors
    ///
    /// Encoding or store failures.
    pub fn save(&self, filters: &TaskFiltersState) -> Result<(), StoreError> {
        let blob = encode_filters(filters)?;
        self.store.set(FILTERS_KEY, &blob)
    }
}
