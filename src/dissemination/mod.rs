//! Job status dissemination to attached observers.
//!
//! [`Dissemination`] subscribes to the [`EventBus`](crate::EventBus), keeps
//! the most recent [`JobStatusRecord`] per job, and forwards every event to
//! every attached observer.
//!
//! # Observer lifecycle
//!
//! `attached → receiving → detached`.
//!
//! - On attach the observer is sent a [`ObserverMessage::Snapshot`] of all
//!   known jobs, then registered for forwarding. Both happen under the
//!   same lock that serializes publishing, so an observer attaching while
//!   an event is being fanned out sees that event either in its snapshot
//!   or as a forwarded status, never half of a pass.
//! - On each event the record is overwritten and the event forwarded to
//!   each observer in publication order.
//! - A send that fails (connection closed, or buffer full so the observer
//!   is lagging) detaches that observer. The failure is logged and counted;
//!   it never reaches the publisher. A lagging observer can attach again
//!   and start over from a fresh snapshot.
//!
//! Sinks are called with the registry lock held and must not block.

mod channel;

pub use channel::{ChannelSink, DEFAULT_OBSERVER_BUFFER, ObserverStream};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::{debug, warn};

use crate::bus::EventSubscriber;
use crate::telemetry;
use crate::types::{JobId, JobStatusEvent, JobStatusRecord, ObserverId, ObserverMessage};
use crate::{JobcastError, Result};

/// Push channel to one observer.
///
/// Implementations wrap whatever transport accepted the observer. `send`
/// must return promptly; report a full buffer as
/// [`JobcastError::ObserverLagging`] and a gone peer as
/// [`JobcastError::ObserverClosed`].
pub trait ObserverSink: Send + Sync {
    fn send(&self, message: &ObserverMessage) -> Result<()>;

    /// Whether the underlying connection is still open. Closed sinks are
    /// pruned without a send attempt.
    fn is_open(&self) -> bool {
        true
    }
}

/// Bounds for the job status registry.
///
/// ```rust
/// # use jobcast::StatusRegistryConfig;
/// # use std::time::Duration;
/// let config = StatusRegistryConfig::new()
///     .max_records(1_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct StatusRegistryConfig {
    /// Maximum number of jobs whose status is retained. Past it the job
    /// least recently published or looked up is dropped. Default: 10,000.
    pub max_records: u64,
    /// How long a record is kept after its last update. Default: 24 hours.
    pub ttl: Duration,
}

impl Default for StatusRegistryConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            ttl: Duration::from_secs(24 * 3600),
        }
    }
}

impl StatusRegistryConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retained job records.
    pub fn max_records(mut self, n: u64) -> Self {
        self.max_records = n;
        self
    }

    /// Set how long a record survives without updates.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Observer registry plus last-known status of every job.
pub struct Dissemination {
    records: Cache<JobId, JobStatusRecord>,
    // Guards the observer set and serializes record updates with fan-out.
    observers: Mutex<BTreeMap<ObserverId, Arc<dyn ObserverSink>>>,
    next_id: AtomicU64,
}

impl Dissemination {
    pub fn new(config: &StatusRegistryConfig) -> Self {
        let records = Cache::builder()
            .max_capacity(config.max_records)
            .eviction_policy(EvictionPolicy::lru())
            .time_to_live(config.ttl)
            .build();
        Self {
            records,
            observers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach an observer: send it the current snapshot, then forward
    /// every subsequent event to it.
    ///
    /// If the snapshot cannot be delivered the observer is not attached
    /// and the send error is returned.
    pub fn attach(&self, sink: Arc<dyn ObserverSink>) -> Result<ObserverId> {
        let mut observers = self.lock_observers();

        let snapshot = ObserverMessage::Snapshot {
            jobs: self.sorted_records(),
        };
        sink.send(&snapshot)?;

        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        observers.insert(id, sink);
        metrics::gauge!(telemetry::OBSERVERS_ATTACHED).set(observers.len() as f64);
        debug!(observer = %id, "observer attached");
        Ok(id)
    }

    /// Detach an observer. Returns `false` if it was not attached.
    pub fn detach(&self, id: ObserverId) -> bool {
        let mut observers = self.lock_observers();
        let removed = observers.remove(&id).is_some();
        if removed {
            metrics::gauge!(telemetry::OBSERVERS_ATTACHED).set(observers.len() as f64);
            debug!(observer = %id, "observer detached");
        }
        removed
    }

    /// Attach a channel-backed observer with the given buffer size.
    ///
    /// The returned stream yields the snapshot first, then every status
    /// event. Dropping it detaches the observer.
    pub fn subscribe(self: &Arc<Self>, buffer: usize) -> Result<ObserverStream> {
        if buffer == 0 {
            return Err(JobcastError::Configuration(
                "observer buffer must be non-zero".to_string(),
            ));
        }
        let (sink, rx) = ChannelSink::new(buffer);
        let id = self.attach(Arc::new(sink))?;
        Ok(ObserverStream::new(id, rx, Arc::downgrade(self)))
    }

    /// Apply an event: overwrite the job's record and forward it.
    pub fn apply(&self, event: &JobStatusEvent) {
        let mut observers = self.lock_observers();
        self.records
            .insert(event.job_id.clone(), JobStatusRecord::from(event));

        if observers.is_empty() {
            return;
        }

        let message = ObserverMessage::Status(event.clone());
        let mut failed = Vec::new();
        for (id, sink) in observers.iter() {
            let outcome = if sink.is_open() {
                sink.send(&message)
            } else {
                Err(JobcastError::ObserverClosed)
            };
            if let Err(e) = outcome {
                let reason = match e {
                    JobcastError::ObserverLagging => "lagging",
                    _ => "closed",
                };
                warn!(observer = %id, job_id = %event.job_id, error = %e, "dropping observer after failed send");
                metrics::counter!(telemetry::OBSERVER_SEND_FAILURES_TOTAL, "reason" => reason)
                    .increment(1);
                failed.push(*id);
            }
        }

        if !failed.is_empty() {
            for id in failed {
                observers.remove(&id);
            }
            metrics::gauge!(telemetry::OBSERVERS_ATTACHED).set(observers.len() as f64);
        }
    }

    /// Most recent status of a job, if known.
    pub fn status(&self, job_id: &JobId) -> Option<JobStatusRecord> {
        self.records.get(job_id)
    }

    /// Most recent status of every known job, ordered by job id.
    pub fn snapshot(&self) -> Vec<JobStatusRecord> {
        let _observers = self.lock_observers();
        self.sorted_records()
    }

    /// Number of jobs with a retained status record.
    pub fn record_count(&self) -> usize {
        self.records.run_pending_tasks();
        self.records.iter().count()
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.lock_observers().len()
    }

    fn sorted_records(&self) -> Vec<JobStatusRecord> {
        // Capacity evictions are applied lazily; settle them before listing.
        self.records.run_pending_tasks();
        let mut records: Vec<JobStatusRecord> =
            self.records.iter().map(|(_, record)| record).collect();
        records.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        records
    }

    fn lock_observers(&self) -> MutexGuard<'_, BTreeMap<ObserverId, Arc<dyn ObserverSink>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Dissemination {
    fn default() -> Self {
        Self::new(&StatusRegistryConfig::default())
    }
}

impl EventSubscriber for Dissemination {
    fn on_event(&self, event: &JobStatusEvent) {
        self.apply(event);
    }
}
