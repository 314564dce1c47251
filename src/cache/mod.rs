//! Per-job similarity cache.
//!
//! Producers record every value they emit for a job and ask whether a new
//! value is similar to one already seen, so near-duplicates within a single
//! job run can be skipped.
//!
//! # Architecture
//!
//! - Moka-backed bounded map, keyed on [`JobId`], holding one
//!   [`SimilarityEntry`] per job. Entries are created lazily on the first
//!   recorded value.
//! - A new job is always admitted. Once `max_entries` is exceeded the least
//!   recently used job is dropped; such capacity evictions are logged at
//!   `warn` and counted.
//! - Expiry is fixed from creation (no sliding): a background sweep,
//!   started by [`SimilarityCache::initialize()`], removes every entry older
//!   than the retention window.
//! - The retention window derives from the producers' polling interval
//!   (see [`retention_for_poll_interval()`]) and is fixed once initialized.
//! - Lifecycle is `new → initialize → stop`. Stopping only cancels the
//!   sweep; contents remain until the cache is dropped.

pub mod entry;
pub mod predicate;

pub use entry::SimilarityEntry;
pub use predicate::{ExactMatch, NormalizedMatch, SimilarityPredicate};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::telemetry;
use crate::types::JobId;
use crate::{JobcastError, Result};

/// Retention used when the polling interval is longer than it.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Default period between eviction sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Derive the retention window from a polling interval in minutes.
///
/// If the interval is at most [`DEFAULT_RETENTION`], retention is half the
/// interval; otherwise the default stands. A zero or overflowing interval
/// is a configuration error.
///
/// ```rust
/// # use jobcast::cache::retention_for_poll_interval;
/// # use std::time::Duration;
/// assert_eq!(retention_for_poll_interval(2).unwrap(), Duration::from_secs(60));
/// assert_eq!(retention_for_poll_interval(30).unwrap(), Duration::from_secs(300));
/// ```
pub fn retention_for_poll_interval(poll_interval_minutes: u64) -> Result<Duration> {
    if poll_interval_minutes == 0 {
        return Err(JobcastError::Configuration(
            "poll interval must be at least one minute".to_string(),
        ));
    }
    let interval_ms = poll_interval_minutes.checked_mul(60_000).ok_or_else(|| {
        JobcastError::Configuration(format!(
            "poll interval of {poll_interval_minutes} minutes is out of range"
        ))
    })?;
    let default_ms = DEFAULT_RETENTION.as_millis() as u64;
    if interval_ms <= default_ms {
        Ok(Duration::from_millis(interval_ms / 2))
    } else {
        Ok(DEFAULT_RETENTION)
    }
}

/// Configuration for the similarity cache.
///
/// ```rust
/// # use jobcast::SimilarityCacheConfig;
/// # use std::time::Duration;
/// let config = SimilarityCacheConfig::new()
///     .max_entries(50_000)
///     .sweep_interval(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct SimilarityCacheConfig {
    /// Maximum number of tracked jobs. Past it the least recently used job
    /// is dropped. Default: 10,000.
    pub max_entries: u64,
    /// Period between eviction sweeps. Default: 10 seconds.
    pub sweep_interval: Duration,
}

impl Default for SimilarityCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl SimilarityCacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tracked jobs.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the period between eviction sweeps.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

struct SweepState {
    retention: Duration,
    task: Option<JoinHandle<()>>,
}

/// Thread-safe map from job id to its similarity entry.
///
/// Shared by reference (typically behind an `Arc`) between every producer
/// of a process. See module docs for the lifecycle.
pub struct SimilarityCache {
    entries: Cache<JobId, Arc<SimilarityEntry>>,
    predicate: Arc<dyn SimilarityPredicate>,
    sweep_interval: Duration,
    sweep: Mutex<SweepState>,
}

impl SimilarityCache {
    /// Create a cache using [`ExactMatch`] as its predicate.
    pub fn new(config: &SimilarityCacheConfig) -> Self {
        Self::with_predicate(config, ExactMatch)
    }

    /// Create a cache hosting a custom similarity predicate.
    pub fn with_predicate(
        config: &SimilarityCacheConfig,
        predicate: impl SimilarityPredicate + 'static,
    ) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(config.max_entries)
                .eviction_policy(EvictionPolicy::lru())
                .eviction_listener(on_capacity_eviction)
                .build(),
            predicate: Arc::new(predicate),
            sweep_interval: config.sweep_interval,
            sweep: Mutex::new(SweepState {
                retention: DEFAULT_RETENTION,
                task: None,
            }),
        }
    }

    /// Fix the retention window and start the eviction sweep.
    ///
    /// Fails fast on an invalid interval, leaving any running sweep
    /// untouched. Calling again replaces the previous sweep. Must be called
    /// from within a tokio runtime.
    pub fn initialize(&self, poll_interval_minutes: u64) -> Result<Duration> {
        let retention = retention_for_poll_interval(poll_interval_minutes)?;
        if self.sweep_interval.is_zero() {
            return Err(JobcastError::Configuration(
                "sweep interval must be non-zero".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            JobcastError::Configuration(
                "similarity cache must be initialized inside a tokio runtime".to_string(),
            )
        })?;

        let mut state = self.lock_sweep();
        if let Some(previous) = state.task.take() {
            previous.abort();
            debug!("replaced running similarity sweep");
        }
        state.retention = retention;

        let entries = self.entries.clone();
        let period = self.sweep_interval;
        state.task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweep(&entries, retention);
            }
        }));

        info!(
            poll_interval_minutes,
            retention_ms = retention.as_millis() as u64,
            sweep_interval_ms = period.as_millis() as u64,
            "similarity cache initialized"
        );
        Ok(retention)
    }

    /// Cancel the eviction sweep. Idempotent; contents are kept.
    pub fn stop(&self) {
        if let Some(task) = self.lock_sweep().task.take() {
            task.abort();
            debug!("similarity sweep stopped");
        }
    }

    /// Whether the eviction sweep is currently scheduled.
    pub fn is_running(&self) -> bool {
        self.lock_sweep()
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// The retention window in effect.
    pub fn retention(&self) -> Duration {
        self.lock_sweep().retention
    }

    /// Record a value for a job, creating the job's entry if needed.
    ///
    /// Empty values are ignored and never create an entry.
    pub fn record_value(&self, job_id: &JobId, value: &str) {
        if value.is_empty() {
            return;
        }
        let entry = self
            .entries
            .get_with_by_ref(job_id, || Arc::new(SimilarityEntry::new(Instant::now())));
        if entry.record(value) {
            metrics::counter!(telemetry::VALUES_RECORDED_TOTAL).increment(1);
        }
    }

    /// Whether `value` is similar to anything recorded for the job.
    ///
    /// Returns `false` for unknown jobs and for empty values.
    pub fn is_similar(&self, job_id: &JobId, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        let similar = self
            .entries
            .get(job_id)
            .is_some_and(|entry| entry.is_similar(self.predicate.as_ref(), value));
        let result = if similar { "similar" } else { "distinct" };
        metrics::counter!(telemetry::SIMILARITY_CHECKS_TOTAL, "result" => result).increment(1);
        similar
    }

    /// Look up a job's entry.
    pub fn entry(&self, job_id: &JobId) -> Option<Arc<SimilarityEntry>> {
        self.entries.get(job_id)
    }

    /// Whether the job currently has an entry.
    pub fn contains(&self, job_id: &JobId) -> bool {
        self.entries.contains_key(job_id)
    }

    /// Remove every entry older than the retention window now.
    ///
    /// Runs the same pass as the background sweep and returns the number
    /// of entries removed.
    pub fn sweep_expired(&self) -> usize {
        sweep(&self.entries, self.retention())
    }

    /// Number of jobs currently tracked.
    pub fn len(&self) -> usize {
        // Apply pending capacity evictions first so the count is exact.
        self.entries.run_pending_tasks();
        self.entries.iter().count()
    }

    /// Whether no job is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    fn lock_sweep(&self) -> MutexGuard<'_, SweepState> {
        self.sweep.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SimilarityCache {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One eviction pass. Each entry is judged on its own creation time only.
fn sweep(entries: &Cache<JobId, Arc<SimilarityEntry>>, retention: Duration) -> usize {
    let now = Instant::now();
    let expired: Vec<Arc<JobId>> = entries
        .iter()
        .filter(|(_, entry)| entry.is_expired(now, retention))
        .map(|(job_id, _)| job_id)
        .collect();

    for job_id in &expired {
        entries.invalidate(job_id.as_ref());
        debug!(job_id = %job_id, "evicted similarity entry");
    }

    if !expired.is_empty() {
        metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "cause" => "expired")
            .increment(expired.len() as u64);
    }
    expired.len()
}

fn on_capacity_eviction(job_id: Arc<JobId>, entry: Arc<SimilarityEntry>, cause: RemovalCause) {
    if !matches!(cause, RemovalCause::Size) {
        return;
    }
    warn!(
        job_id = %job_id,
        values = entry.len(),
        "similarity cache full, dropped least recently used job"
    );
    metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "cause" => "capacity").increment(1);
}
