//! Named key-value preference stores.
//!
//! A preference store is a small, process-local map persisted as one JSON file per
//! name (`<dir>/<name>.json`). Reads never fail: a missing or corrupt file is
//! treated as empty. Writes go through a temp file and an atomic rename.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::atomic::write_json_atomic;
use crate::error::{CoreError, Result};

type PrefMap = BTreeMap<String, Value>;

/// Durable key-value storage for small settings and counters.
pub trait PreferenceStore: Send + Sync {
    /// Integer stored under `key`, or `default` when absent or not an integer.
    fn get_int(&self, key: &str, default: i64) -> i64;

    fn put_int(&self, key: &str, value: i64) -> Result<()>;

    fn get_string(&self, key: &str) -> Option<String>;

    fn put_string(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Read-modify-write of an integer under a single lock. Returns the new value.
    fn update_int(&self, key: &str, default: i64, f: &mut dyn FnMut(i64) -> i64) -> Result<i64>;
}

/// In-memory preference store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<PrefMap>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, PrefMap>> {
        self.values
            .lock()
            .map_err(|_| CoreError::config("preference lock poisoned"))
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.lock()
            .ok()
            .and_then(|map| map.get(key).and_then(Value::as_i64))
            .unwrap_or(default)
    }

    fn put_int(&self, key: &str, value: i64) -> Result<()> {
        self.lock()?.insert(key.to_string(), Value::from(value));
        Ok(())
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|map| map.get(key).and_then(Value::as_str).map(str::to_string))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), Value::from(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn update_int(&self, key: &str, default: i64, f: &mut dyn FnMut(i64) -> i64) -> Result<i64> {
        let mut map = self.lock()?;
        let current = map.get(key).and_then(Value::as_i64).unwrap_or(default);
        let next = f(current);
        map.insert(key.to_string(), Value::from(next));
        Ok(next)
    }
}

/// Preference store backed by `<dir>/<name>.json`.
///
/// The file is read once at open; every write rewrites it while holding the lock,
/// so concurrent writers inside one process are serialized.
#[derive(Debug)]
pub struct JsonPreferences {
    path: PathBuf,
    values: Mutex<PrefMap>,
}

impl JsonPreferences {
    pub fn open(dir: &Path, name: &str) -> Result<Self> {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(CoreError::invalid_input(format!(
                "invalid preference store name '{}'",
                name
            )));
        }
        let path = dir.join(format!("{}.json", name));
        let values = load_map(&path);
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, PrefMap>> {
        self.values
            .lock()
            .map_err(|_| CoreError::config("preference lock poisoned"))
    }

    /// Apply `f` to the map and write the result. The in-memory map only changes
    /// when the write succeeds.
    fn mutate<T>(&self, f: impl FnOnce(&mut PrefMap) -> T) -> Result<T> {
        let mut map = self.lock()?;
        let mut next = map.clone();
        let out = f(&mut next);
        write_json_atomic(&self.path, &next)?;
        *map = next;
        Ok(out)
    }
}

impl PreferenceStore for JsonPreferences {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.lock()
            .ok()
            .and_then(|map| map.get(key).and_then(Value::as_i64))
            .unwrap_or(default)
    }

    fn put_int(&self, key: &str, value: i64) -> Result<()> {
        self.mutate(|map| {
            map.insert(key.to_string(), Value::from(value));
        })
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|map| map.get(key).and_then(Value::as_str).map(str::to_string))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|map| {
            map.insert(key.to_string(), Value::from(value));
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|map| {
            map.remove(key);
        })
    }

    fn update_int(&self, key: &str, default: i64, f: &mut dyn FnMut(i64) -> i64) -> Result<i64> {
        self.mutate(|map| {
            let current = map.get(key).and_then(Value::as_i64).unwrap_or(default);
            let next = f(current);
            map.insert(key.to_string(), Value::from(next));
            next
        })
    }
}

fn load_map(path: &Path) -> PrefMap {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PrefMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read preferences; starting empty");
            return PrefMap::new();
        }
    };
    match serde_json::from_str::<PrefMap>(&content) {
        Ok(map) => map,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt preferences file; starting empty");
            PrefMap::new()
        }
    }
}
