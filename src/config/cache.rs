use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use super::error::{ConfigError, ConfigResult};

/// Storage for resolved scalar bindings.
///
/// A cache only shortens startup; resolution is correct without one.
pub trait CacheProvider: Send + Sync {
    fn get(&self, key: &str) -> ConfigResult<Option<Value>>;
    fn set(&self, key: &str, value: &Value) -> ConfigResult<()>;
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheProvider for MemoryCache {
    fn get(&self, key: &str) -> ConfigResult<Option<Value>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ConfigError::Cache("memory cache lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> ConfigResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ConfigError::Cache("memory cache lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// JSON file cache that survives process restarts.
///
/// The whole file is one JSON object keyed by cache key. Writes go to a
/// sibling temp file and are renamed into place.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> ConfigResult<Map<String, Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                // A corrupt cache is discarded rather than failing boot
                tracing::warn!("Ignoring unreadable config cache at {}", self.path.display());
                Ok(Map::new())
            }
        }
    }
}

impl CacheProvider for FileCache {
    fn get(&self, key: &str) -> ConfigResult<Option<Value>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ConfigError::Cache("file cache lock poisoned".to_string()))?;
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> ConfigResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ConfigError::Cache("file cache lock poisoned".to_string()))?;

        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.clone());

        let body = serde_json::to_vec_pretty(&Value::Object(entries))
            .map_err(|e| ConfigError::Cache(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        let io_err = |source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}
