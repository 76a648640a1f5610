//! This is a library for persisting app state to a synchronous, string-keyed,
//! quota-limited key-value store (in the browser: `window.localStorage`).
//! It was created for Quizfolio, so it doesn't include much that was not
//! needed for that project.
//!
//! Storage model:
//! 1. Each table is one JSON blob under one key. A save serializes the whole
//!    value and overwrites the key; there are no partial or delta writes.
//! 2. Blobs carry a version envelope. Loading tolerates missing keys and
//!    unreadable blobs by falling back to the table's default value, so a
//!    schema change never bricks the app.
//! 3. There is no cross-tab coordination. Two tabs writing the same key is
//!    last-writer-wins at whole-table granularity, which callers accept by
//!    construction.
//!
//! Sounds simple, but the quota and corruption edges are where the bugs live,
//! so they are handled in exactly one place: here.

#[cfg(target_arch = "wasm32")]
pub mod web;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// The seam between tables and whatever actually holds the bytes. Synchronous
/// by design: the store this models (`localStorage`) is synchronous, and the
/// app's mutations are memory-first with a best-effort write behind them.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str);
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded while writing `{key}`")]
    QuotaExceeded { key: String },
    #[error("could not serialize `{key}`: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("backend failure for `{key}`: {message}")]
    Backend { key: String, message: String },
}

/// Version envelope written around every blob. Adding `V2 { .. }` later is a
/// backward-compatible change: old app versions fail to parse it and fall
/// back to defaults instead of misreading it.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "version")]
enum VersionedBlob<T> {
    V1 { data: T },
}

/// A typed table bound to one storage key.
///
/// `load` never fails: a missing key yields `T::default()`, and a blob that
/// does not parse is logged and replaced by `T::default()` on the next save.
/// `save` rewrites the entire value, which is the unit of atomicity (and of
/// cross-tab clobbering) for everything stored through this library.
pub struct Table<T> {
    key: String,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned + Default> Table<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self, backend: &dyn StorageBackend) -> T {
        let Some(raw) = backend.get(&self.key) else {
            return T::default();
        };

        match serde_json::from_str::<VersionedBlob<T>>(&raw) {
            Ok(VersionedBlob::V1 { data }) => data,
            Err(e) => {
                log::warn!(
                    "Unreadable blob under `{}`, starting from defaults: {e:?}",
                    self.key
                );
                T::default()
            }
        }
    }

    pub fn save(&self, backend: &dyn StorageBackend, value: &T) -> Result<(), StorageError> {
        let blob = serde_json::to_string(&VersionedBlob::V1 { data: value })
            .map_err(|source| StorageError::Serialization {
                key: self.key.clone(),
                source,
            })?;
        backend.set(&self.key, &blob)
    }

    pub fn clear(&self, backend: &dyn StorageBackend) {
        backend.remove(&self.key);
    }
}

/// In-memory backend for native builds and tests. The optional byte quota
/// exists so quota-exceeded paths can be exercised without a browser.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RefCell<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            let used: usize = self
                .entries
                .borrow()
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Counter {
        count: u32,
        #[serde(default)]
        label: String,
    }

    #[test]
    fn save_then_load_round_trips() {
        let backend = MemoryBackend::new();
        let table = Table::<Counter>::new("test.counter");
        let value = Counter {
            count: 7,
            label: "seven".to_string(),
        };

        table.save(&backend, &value).unwrap();
        assert_eq!(table.load(&backend), value);
    }

    #[test]
    fn missing_key_loads_default() {
        let backend = MemoryBackend::new();
        let table = Table::<Counter>::new("test.counter");
        assert_eq!(table.load(&backend), Counter::default());
    }

    #[test]
    fn corrupt_blob_loads_default() {
        let backend = MemoryBackend::new();
        backend.set("test.counter", "{not json").unwrap();

        let table = Table::<Counter>::new("test.counter");
        assert_eq!(table.load(&backend), Counter::default());
    }

    #[test]
    fn blob_with_unknown_version_loads_default() {
        let backend = MemoryBackend::new();
        backend
            .set("test.counter", r#"{"version":"V9","data":{"count":3}}"#)
            .unwrap();

        let table = Table::<Counter>::new("test.counter");
        assert_eq!(table.load(&backend), Counter::default());
    }

    #[test]
    fn quota_exceeded_surfaces_and_preserves_old_value() {
        let backend = MemoryBackend::with_quota(100);
        let table = Table::<Counter>::new("k");
        table.save(&backend, &Counter::default()).unwrap();

        let big = Counter {
            count: 1,
            label: "x".repeat(200),
        };
        let err = table.save(&backend, &big).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));

        // The failed write must not have clobbered the stored blob
        assert_eq!(table.load(&backend), Counter::default());
    }

    #[test]
    fn clear_removes_the_key() {
        let backend = MemoryBackend::new();
        let table = Table::<Counter>::new("k");
        table.save(&backend, &Counter { count: 1, label: String::new() }).unwrap();

        table.clear(&backend);
        assert_eq!(backend.get("k"), None);
        assert_eq!(table.load(&backend), Counter::default());
    }
}
