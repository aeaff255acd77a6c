//! In-process blob store backend.
//!
//! Mirrors the `Dragonfly` backend's observable behavior (including the
//! bounded prior-version history) over a mutex-guarded map. Used by the
//! engine's test suites and by local tooling that has no store to talk
//! to. Exposes a write counter and a write-failure switch so tests can
//! assert zero-write no-ops and exercise the absorbed-failure paths.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::blob::BlobStore;
use crate::error::StoreError;

/// Number of prior versions retained per path, matching the
/// `Dragonfly` backend.
const MAX_HISTORY_VERSIONS: usize = 30;

#[derive(Debug, Default)]
struct MemoryInner {
    /// Current blob values by path.
    blobs: BTreeMap<String, String>,
    /// Prior versions by path, newest first.
    history: BTreeMap<String, Vec<String>>,
    /// Successful write count, for zero-write assertions.
    writes: u64,
    /// When set, every write fails with a backend-style error.
    fail_writes: bool,
}

/// An in-memory [`BlobStore`]. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    /// Make every subsequent write fail, or restore normal operation.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Whether a blob currently exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.lock().blobs.contains_key(path)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A poisoned mutex only means another test thread panicked;
        // the map itself is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStore for MemoryStore {
    async fn read_json<T>(&self, path: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let json = self.lock().blobs.get(path).cloned();
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn write_json<T>(&self, path: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)?;
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StoreError::Config("write failure injected".to_owned()));
        }
        if let Some(previous) = inner.blobs.insert(path.to_owned(), json) {
            let versions = inner.history.entry(path.to_owned()).or_default();
            versions.insert(0, previous);
            versions.truncate(MAX_HISTORY_VERSIONS);
        }
        inner.writes = inner.writes.saturating_add(1);
        Ok(())
    }

    async fn delete_json(&self, path: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.blobs.remove(path);
        inner.history.remove(path);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.blobs.retain(|path, _| !path.starts_with(prefix));
        inner.history.retain(|path, _| !path.starts_with(prefix));
        Ok(())
    }

    async fn list_pathnames(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .blobs
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn read_json_history<T>(&self, path: &str, depth: usize) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let raw: Vec<String> = self
            .lock()
            .history
            .get(path)
            .map(|versions| versions.iter().take(depth).cloned().collect())
            .unwrap_or_default();

        let mut versions = Vec::with_capacity(raw.len());
        for json in &raw {
            match serde_json::from_str(json) {
                Ok(value) => versions.push(value),
                Err(error) => {
                    tracing::warn!(path, %error, "Skipping unparseable history version");
                }
            }
        }
        Ok(versions)
    }
}
