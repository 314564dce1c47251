//! Storage collaborator used by the reset job.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::{JobcastError, Result};

/// The backing store shared with job producers.
///
/// Only the reset job talks to it through this trait. Each call may be
/// slow; none is made while any in-memory lock of this crate is held.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Names of every collection (or table) the process owns.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Drop one collection with all its contents.
    async fn drop_collection(&self, name: &str) -> Result<()>;

    /// Repopulate the minimal baseline data.
    async fn seed_baseline(&self) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, Vec<serde_json::Value>>,
    failing: HashSet<String>,
    seed_runs: usize,
}

/// In-process storage of JSON documents grouped into named collections.
///
/// Backs the daemon when no external store is wired in, and lets a drop
/// failure be injected per collection.
#[derive(Default)]
pub struct MemoryStorage {
    baseline: BTreeMap<String, Vec<serde_json::Value>>,
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    /// Empty storage whose baseline is empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty storage that reseeds the given collections on reset.
    pub fn with_baseline(baseline: BTreeMap<String, Vec<serde_json::Value>>) -> Self {
        Self {
            baseline,
            state: Mutex::default(),
        }
    }

    /// Append a document, creating the collection if needed.
    pub fn insert(&self, collection: &str, document: serde_json::Value) {
        self.lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    /// Contents of a collection, or `None` if it does not exist.
    pub fn collection(&self, name: &str) -> Option<Vec<serde_json::Value>> {
        self.lock().collections.get(name).cloned()
    }

    /// Whether a collection exists.
    pub fn has_collection(&self, name: &str) -> bool {
        self.lock().collections.contains_key(name)
    }

    /// Make every subsequent drop of `name` fail.
    pub fn fail_drops_of(&self, name: &str) {
        self.lock().failing.insert(name.to_string());
    }

    /// How many times the baseline has been seeded.
    pub fn seed_runs(&self) -> usize {
        self.lock().seed_runs
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.lock().collections.keys().cloned().collect())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        if state.failing.contains(name) {
            return Err(JobcastError::Storage {
                collection: name.to_string(),
                message: "drop rejected".to_string(),
            });
        }
        state.collections.remove(name);
        Ok(())
    }

    async fn seed_baseline(&self) -> Result<()> {
        let mut state = self.lock();
        for (name, documents) in &self.baseline {
            state
                .collections
                .entry(name.clone())
                .or_default()
                .extend(documents.iter().cloned());
        }
        state.seed_runs += 1;
        Ok(())
    }
}
