//! In-memory remote and media stores.
//!
//! Test doubles for the sync engine; the CLI only syncs against the HTTP
//! stores. Both are cheap to clone and clones share state.

use super::remote::{MediaStore, QueryFilter, RemoteError, RemoteStore};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct RemoteState {
    collections: HashMap<String, BTreeMap<String, Value>>,
    failing_ids: HashSet<String>,
    unreachable: bool,
    latency: Duration,
    writes: usize,
}

/// Remote store kept in process memory.
#[derive(Clone, Default)]
pub struct InMemoryRemoteStore {
    state: Arc<Mutex<RemoteState>>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reject writes for these record ids until cleared.
    pub fn fail_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let mut state = self.state();
        state
            .failing_ids
            .extend(ids.into_iter().map(|id| id.to_string()));
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_ids.clear();
        state.unreachable = false;
    }

    /// Fail every request with a network error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Delay applied before each request is handled.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Stored document, if any.
    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.state()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.state()
            .collections
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Successful `create` calls so far, repeats included.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    fn latency(&self) -> Duration {
        self.state().latency
    }
}

impl RemoteStore for InMemoryRemoteStore {
    async fn create(&self, collection: &str, id: &str, document: Value) -> Result<(), RemoteError> {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if state.unreachable {
            return Err(RemoteError::Network("remote unreachable".to_string()));
        }
        if state.failing_ids.contains(id) {
            return Err(RemoteError::Rejected {
                status: 500,
                message: format!("write to {}/{} rejected", collection, id),
            });
        }

        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        state.writes += 1;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[QueryFilter],
    ) -> Result<Vec<Value>, RemoteError> {
        let state = self.state();
        if state.unreachable {
            return Err(RemoteError::Network("remote unreachable".to_string()));
        }

        Ok(state
            .collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filters.iter().all(|f| f.matches(doc)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct MediaState {
    files: HashMap<String, Vec<u8>>,
    failing: bool,
}

/// Media store kept in process memory. URLs use the `memory://` scheme.
#[derive(Clone, Default)]
pub struct InMemoryMediaStore {
    state: Arc<Mutex<MediaState>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MediaState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// Bytes stored at `path`.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.state().files.len()
    }
}

impl MediaStore for InMemoryMediaStore {
    async fn upload(&self, blob: &[u8], path: &str) -> Result<String, RemoteError> {
        let mut state = self.state();
        if state.failing {
            return Err(RemoteError::Network("media store unavailable".to_string()));
        }
        state.files.insert(path.to_string(), blob.to_vec());
        Ok(format!("memory://{}", path))
    }
}
