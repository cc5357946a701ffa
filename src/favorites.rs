//! Favorite movie ids, persisted as a JSON array under a single storage key.
//!
//! [`FavoritesSet`] carries the pure update rules; [`FavoritesStore`] owns the key and
//! applies those rules as a compare-and-swap against whatever [`KeyValueStore`] backs it.
//! A mutation is never lost as long as the backing store's swap is atomic for every
//! writer that shares it. [`FileStore`] holds a file lock for that; [`MemoryStore`] only
//! covers handles to the same instance.

use fd_lock::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::StorageError;

pub const FAVORITES_KEY: &str = "movieFavorites";
const MAX_CAS_ATTEMPTS: usize = 8;

/// Insertion-ordered set of movie ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoritesSet {
    ids: Vec<i32>,
}

impl FavoritesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn with_added(mut self, id: i32) -> Self {
        if !self.contains(id) {
            self.ids.push(id);
        }
        self
    }

    pub fn with_removed(mut self, id: i32) -> Self {
        self.ids.retain(|existing| *existing != id);
        self
    }

    pub fn toggled(self, id: i32) -> Self {
        if self.contains(id) {
            self.with_removed(id)
        } else {
            self.with_added(id)
        }
    }

    fn encode(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(&self.ids)?)
    }
}

impl FromIterator<i32> for FavoritesSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        iter.into_iter()
            .fold(FavoritesSet::new(), |set, id| set.with_added(id))
    }
}

/// A persistent string slot per key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `new` only if the current value still equals `expected` (`None` = absent).
    /// Returns `false` without writing when someone else changed the value first.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StorageError>;
}

/// One `<key>.json` file per key inside a data directory.
///
/// Swaps hold an exclusive lock on `<key>.lock` from the read through the rename, so any
/// number of stores opened on the same directory, in one process or several, serialize.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.lock"))
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // Unique temp name per write; the rename is the commit point.
    fn write_atomic(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(self.path_for(key))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.read(key)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StorageError> {
        fs::create_dir_all(&self.dir)?;
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path(key))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock.write()?;

        let current = self.read(key)?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.write_atomic(key, new.as_bytes())?;
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a slot directly, bypassing compare-and-swap.
    pub fn insert(&self, key: &str, value: impl Into<String>) {
        lock(&self.values).insert(key.to_string(), value.into());
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StorageError> {
        let mut values = lock(&self.values);
        if values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), new.to_string());
        Ok(true)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sole owner of the favorites key.
#[derive(Clone)]
pub struct FavoritesStore {
    storage: Arc<dyn KeyValueStore>,
}

impl FavoritesStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Never fails: absent, unreadable or malformed state reads as the empty set.
    pub fn load(&self) -> FavoritesSet {
        match self.storage.get(FAVORITES_KEY) {
            Ok(raw) => decode(raw.as_deref()),
            Err(e) => {
                warn!("Failed to read favorites, treating as empty: {}", e);
                FavoritesSet::new()
            }
        }
    }

    pub fn add(&self, id: i32) -> Result<FavoritesSet, StorageError> {
        self.update(|set| set.with_added(id))
    }

    pub fn remove(&self, id: i32) -> Result<FavoritesSet, StorageError> {
        self.update(|set| set.with_removed(id))
    }

    pub fn toggle(&self, id: i32) -> Result<FavoritesSet, StorageError> {
        self.update(|set| set.toggled(id))
    }

    fn update<F>(&self, apply: F) -> Result<FavoritesSet, StorageError>
    where
        F: Fn(FavoritesSet) -> FavoritesSet,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let raw = self.storage.get(FAVORITES_KEY)?;
            let next = apply(decode(raw.as_deref()));
            let encoded = next.encode()?;
            if self
                .storage
                .compare_and_swap(FAVORITES_KEY, raw.as_deref(), &encoded)?
            {
                info!("Saved {} favorite(s)", next.len());
                return Ok(next);
            }
            debug!(attempt, "Favorites changed underneath us, retrying");
        }
        Err(StorageError::Contention {
            key: FAVORITES_KEY.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }
}

fn decode(raw: Option<&str>) -> FavoritesSet {
    let Some(raw) = raw else {
        return FavoritesSet::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => {
            let ids: Option<Vec<i32>> = items
                .iter()
                .map(|v| v.as_i64().and_then(|n| i32::try_from(n).ok()))
                .collect();
            match ids {
                Some(ids) => ids.into_iter().collect(),
                None => {
                    warn!("Stored favorites contain non-integer ids, treating as empty");
                    FavoritesSet::new()
                }
            }
        }
        Ok(_) => {
            warn!("Stored favorites are not an array, treating as empty");
            FavoritesSet::new()
        }
        Err(e) => {
            warn!("Stored favorites are not valid JSON, treating as empty: {}", e);
            FavoritesSet::new()
        }
    }
}
