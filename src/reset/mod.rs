//! Scheduled demo-mode reset.
//!
//! When demo mode is enabled, [`ResetScheduler`] wipes every storage
//! collection once a day at a fixed local time and reseeds the baseline
//! data.
//!
//! # Partial failure
//!
//! A collection that fails to drop is logged and counted; the remaining
//! collections are still dropped and the baseline is still reseeded. If
//! the collections cannot even be enumerated, nothing is dropped and the
//! run fails without reseeding.
//!
//! # Interaction with in-flight jobs
//!
//! The reset runs on its own task and never touches the similarity cache
//! or the status registry, so lookups and forwarding are never blocked by
//! the (slow) wipe. The cost is an accepted inconsistency window: jobs
//! whose backing records were just dropped may still publish statuses and
//! keep similarity entries until those age out. Producers are not quiesced.

mod storage;
mod trigger;

pub use storage::{MemoryStorage, StorageBackend};
pub use trigger::{next_trigger_after, parse_time_of_day};

use std::sync::Arc;

use chrono::{Local, NaiveTime};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::telemetry;
use crate::{JobcastError, Result};

/// Configuration for the daily reset.
///
/// ```rust
/// # use jobcast::ResetConfig;
/// # use chrono::NaiveTime;
/// let config = ResetConfig::new()
///     .enabled(true)
///     .at(NaiveTime::from_hms_opt(3, 0, 0).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct ResetConfig {
    /// Demo mode. When false no timer is registered. Default: false.
    pub enabled: bool,
    /// Local time of day the reset fires. Default: midnight.
    pub at: NaiveTime,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            at: NaiveTime::default(),
        }
    }
}

impl ResetConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the daily reset.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the local time of day the reset fires.
    pub fn at(mut self, at: NaiveTime) -> Self {
        self.at = at;
        self
    }
}

/// Outcome of one reset run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    /// Collections dropped successfully.
    pub dropped: Vec<String>,
    /// Collections whose drop failed.
    pub failed: Vec<String>,
}

impl ResetReport {
    /// Whether every collection was dropped.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Performs reset runs against a storage backend.
pub struct ResetScheduler {
    storage: Arc<dyn StorageBackend>,
    // Serializes manual and scheduled runs.
    running: tokio::sync::Mutex<()>,
}

impl ResetScheduler {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Drop every collection, then reseed the baseline.
    pub async fn run_once(&self) -> Result<ResetReport> {
        let _guard = self.running.lock().await;
        let result = self.wipe_and_reseed().await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::RESET_RUNS_TOTAL, "status" => status).increment(1);
        result
    }

    async fn wipe_and_reseed(&self) -> Result<ResetReport> {
        let collections = self
            .storage
            .list_collections()
            .await
            .map_err(|e| JobcastError::Enumerate(e.to_string()))?;

        let mut report = ResetReport::default();
        for name in collections {
            match self.storage.drop_collection(&name).await {
                Ok(()) => report.dropped.push(name),
                Err(e) => {
                    warn!(collection = %name, error = %e, "failed to drop collection, continuing");
                    metrics::counter!(telemetry::RESET_COLLECTION_FAILURES_TOTAL).increment(1);
                    report.failed.push(name);
                }
            }
        }

        self.storage.seed_baseline().await.map_err(|e| match e {
            JobcastError::Seed(_) => e,
            other => JobcastError::Seed(other.to_string()),
        })?;

        info!(
            dropped = report.dropped.len(),
            failed = report.failed.len(),
            "demo reset complete"
        );
        Ok(report)
    }

    /// Start the daily timer.
    ///
    /// Returns `Ok(None)` without registering anything when the reset is
    /// disabled. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>, config: &ResetConfig) -> Result<Option<ResetHandle>> {
        if !config.enabled {
            info!("demo reset disabled");
            return Ok(None);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            JobcastError::Configuration(
                "reset scheduler must be started inside a tokio runtime".to_string(),
            )
        })?;

        let scheduler = Arc::clone(self);
        let at = config.at;
        let task = runtime.spawn(async move { scheduler.daily_loop(at).await });
        Ok(Some(ResetHandle { task }))
    }

    async fn daily_loop(&self, at: NaiveTime) {
        let mut last_fired = None;
        loop {
            let now = Local::now();
            // Never schedule at or before the trigger that just fired, even
            // if the wall clock has not caught up with the timer.
            let from = match last_fired {
                Some(fired) if fired > now => fired,
                _ => now,
            };
            let Some(next) = next_trigger_after(&from, at) else {
                error!(%at, "no representable reset time left, stopping scheduler");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next = %next, wait_secs = wait.as_secs(), "next demo reset scheduled");

            tokio::time::sleep(wait).await;
            last_fired = Some(next);

            if let Err(e) = self.run_once().await {
                error!(error = %e, "demo reset failed");
            }
        }
    }
}

/// Handle to a running daily timer.
///
/// Dropping the handle cancels the timer.
pub struct ResetHandle {
    task: JoinHandle<()>,
}

impl ResetHandle {
    /// Cancel the timer. Idempotent.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the timer is still scheduled.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ResetHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
