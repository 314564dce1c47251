//! Per-job similarity state.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::predicate::SimilarityPredicate;

/// Creation time plus every value recorded for one job.
///
/// `created_at` is fixed at construction; `seen` only grows. Mutation of
/// `seen` is serialized through the entry's own lock, so concurrent
/// producers for the same job never lose a value.
#[derive(Debug)]
pub struct SimilarityEntry {
    created_at: Instant,
    seen: Mutex<SeenValues>,
}

/// Values in insertion order, indexed for constant-time duplicate checks.
#[derive(Debug, Default)]
struct SeenValues {
    ordered: Vec<String>,
    index: HashSet<String>,
}

impl SimilarityEntry {
    pub(crate) fn new(created_at: Instant) -> Self {
        Self {
            created_at,
            seen: Mutex::new(SeenValues::default()),
        }
    }

    /// When the first value for this job was recorded.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Whether the entry is older than `retention` at `now`.
    pub fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > retention
    }

    /// Add a value to the seen-set. Returns `false` if it was already there.
    pub fn record(&self, value: &str) -> bool {
        let mut seen = self.lock_seen();
        if seen.index.contains(value) {
            return false;
        }
        seen.index.insert(value.to_string());
        seen.ordered.push(value.to_string());
        true
    }

    /// Evaluate `predicate` against the full current seen-set.
    pub fn is_similar(&self, predicate: &dyn SimilarityPredicate, candidate: &str) -> bool {
        let seen = self.lock_seen();
        predicate.is_similar(&seen.ordered, candidate)
    }

    /// Number of distinct values recorded.
    pub fn len(&self) -> usize {
        self.lock_seen().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic inside a predicate must not wedge the job's entry.
    fn lock_seen(&self) -> MutexGuard<'_, SeenValues> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
