//! Durable key-value state: the enabled flag, the pending and downloaded
//! asset sets, the asset name registry and scheduled jobs.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::StoreError;

/// Keys used by the mirror.
pub mod keys {
    pub const ENABLED: &str = "enabled";
    pub const PENDING_ASSETS: &str = "pending_assets";
    pub const DOWNLOADED_ASSETS: &str = "downloaded_assets";
    pub const FAILED_ASSETS: &str = "failed_assets";
    pub const ASSET_NAMES: &str = "asset_names";
    pub const SCHEDULED_JOBS: &str = "scheduled_jobs";
}

/// Atomic per-key storage supplied by the host.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Typed access on top of any [`KeyValueStore`].
pub trait KeyValueStoreExt {
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StoreError>;
    fn set_value<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StoreError> {
        match self.get(key)? {
            Some(value) => serde_json::from_value(value).map_err(|source| StoreError::Json {
                key: key.to_string(),
                source,
            }),
            None => Ok(default),
        }
    }

    fn set_value<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Json {
            key: key.to_string(),
            source,
        })?;
        self.set(key, value)
    }
}

/// Process-local store, for tests and embedding hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON document, replaced atomically on every write.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let store = Self {
            path,
            lock: Mutex::new(()),
        };
        // Fail early on an unreadable or corrupt file.
        store.load()?;
        Ok(store)
    }

    fn load(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            key: self.path.display().to_string(),
            source,
        })
    }

    fn save(&self, values: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(io_err)?;

        let json = serde_json::to_vec_pretty(values).map_err(|source| StoreError::Json {
            key: self.path.display().to_string(),
            source,
        })?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(io_err)?;
        temp.write_all(&json).map_err(io_err)?;
        temp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut values = self.load()?;
        values.insert(key.to_string(), value);
        self.save(&values)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}
