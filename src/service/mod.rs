//! The assembled service: similarity cache, event bus, dissemination and
//! the optional demo reset, owned together.

mod builder;

pub use builder::{DEFAULT_POLL_INTERVAL_MINUTES, JobcastBuilder};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::cache::SimilarityCache;
use crate::dissemination::{Dissemination, ObserverStream};
use crate::reset::{ResetConfig, ResetHandle, ResetReport, ResetScheduler};
use crate::types::{JobId, JobStatus};
use crate::{EventBus, JobcastError, Result};

/// Explicitly constructed owner of every subsystem.
///
/// Lifecycle is `build → start → shutdown`. Producers and transports get
/// at the parts through the accessors or the convenience methods.
///
/// ```rust,no_run
/// use jobcast::{Jobcast, JobStatus, JobId};
///
/// #[tokio::main]
/// async fn main() -> jobcast::Result<()> {
///     let service = Jobcast::builder().poll_interval_minutes(2).build()?;
///     service.start()?;
///
///     let job = JobId::new("import-42");
///     if !service.is_similar(&job, "12 Acacia Ave") {
///         service.record_value(&job, "12 Acacia Ave");
///     }
///     service.publish(job, JobStatus::Running, serde_json::json!({"listings": 1}));
///
///     service.shutdown();
///     Ok(())
/// }
/// ```
pub struct Jobcast {
    cache: Arc<SimilarityCache>,
    bus: Arc<EventBus>,
    dissemination: Arc<Dissemination>,
    reset: Option<Arc<ResetScheduler>>,
    reset_config: ResetConfig,
    poll_interval_minutes: u64,
    observer_buffer: usize,
    reset_handle: Mutex<Option<ResetHandle>>,
}

impl Jobcast {
    /// Create a new builder for configuring the service.
    pub fn builder() -> JobcastBuilder {
        JobcastBuilder::new()
    }

    pub(crate) fn new(
        cache: Arc<SimilarityCache>,
        bus: Arc<EventBus>,
        dissemination: Arc<Dissemination>,
        reset: Option<Arc<ResetScheduler>>,
        reset_config: ResetConfig,
        poll_interval_minutes: u64,
        observer_buffer: usize,
    ) -> Self {
        Self {
            cache,
            bus,
            dissemination,
            reset,
            reset_config,
            poll_interval_minutes,
            observer_buffer,
            reset_handle: Mutex::new(None),
        }
    }

    /// Start the similarity sweep and, in demo mode, the daily reset.
    ///
    /// Calling again restarts both timers.
    pub fn start(&self) -> Result<()> {
        let retention = self.cache.initialize(self.poll_interval_minutes)?;

        if let Some(reset) = &self.reset {
            let handle = reset.start(&self.reset_config)?;
            if let Some(previous) = std::mem::replace(&mut *self.lock_reset_handle(), handle) {
                previous.stop();
            }
        }

        info!(
            retention_ms = retention.as_millis() as u64,
            demo_reset = self.reset_config.enabled,
            "jobcast started"
        );
        Ok(())
    }

    /// Stop every background timer. Idempotent.
    pub fn shutdown(&self) {
        self.cache.stop();
        if let Some(handle) = self.lock_reset_handle().take() {
            handle.stop();
        }
        info!("jobcast stopped");
    }

    /// Whether the demo reset timer is scheduled.
    pub fn reset_scheduled(&self) -> bool {
        self.lock_reset_handle()
            .as_ref()
            .is_some_and(ResetHandle::is_running)
    }

    pub fn cache(&self) -> &Arc<SimilarityCache> {
        &self.cache
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn dissemination(&self) -> &Arc<Dissemination> {
        &self.dissemination
    }

    /// See [`SimilarityCache::record_value()`].
    pub fn record_value(&self, job_id: &JobId, value: &str) {
        self.cache.record_value(job_id, value);
    }

    /// See [`SimilarityCache::is_similar()`].
    pub fn is_similar(&self, job_id: &JobId, value: &str) -> bool {
        self.cache.is_similar(job_id, value)
    }

    /// See [`EventBus::publish()`].
    pub fn publish(&self, job_id: impl Into<JobId>, status: JobStatus, payload: serde_json::Value) {
        self.bus.publish(job_id, status, payload);
    }

    /// Attach a channel-backed observer using the configured buffer.
    pub fn subscribe(&self) -> Result<ObserverStream> {
        self.dissemination.subscribe(self.observer_buffer)
    }

    /// Run the reset immediately, regardless of demo mode.
    pub async fn run_reset(&self) -> Result<ResetReport> {
        match &self.reset {
            Some(reset) => reset.run_once().await,
            None => Err(JobcastError::Configuration(
                "no storage configured for reset".to_string(),
            )),
        }
    }

    fn lock_reset_handle(&self) -> MutexGuard<'_, Option<ResetHandle>> {
        self.reset_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Jobcast {
    fn drop(&mut self) {
        self.cache.stop();
    }
}
