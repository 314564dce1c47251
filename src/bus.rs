//! Typed publish/subscribe channel for job status events.
//!
//! Producers call [`EventBus::publish()`]; subscribers implement
//! [`EventSubscriber`] and are invoked synchronously, in registration
//! order, for every event. A publish returns only after every subscriber
//! has seen the event, which gives each subscriber the events in exactly
//! the order they were published.
//!
//! Subscribers must not block: anything slow belongs behind a channel on
//! the subscriber's side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::telemetry;
use crate::types::{JobId, JobStatus, JobStatusEvent};

/// Receives every event published on an [`EventBus`].
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &JobStatusEvent);
}

/// Registration handle returned by [`EventBus::subscribe()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Explicit subscriber list with a register/unregister contract.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<(SubscriberId, Arc<dyn EventSubscriber>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. It receives events published from now on.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Publish a status change for a job.
    pub fn publish(
        &self,
        job_id: impl Into<JobId>,
        status: JobStatus,
        payload: serde_json::Value,
    ) {
        self.publish_event(JobStatusEvent::new(job_id, status, payload));
    }

    /// Publish a pre-built event.
    pub fn publish_event(&self, event: JobStatusEvent) {
        // Snapshot the list so subscribers may (un)subscribe from inside
        // `on_event` without deadlocking.
        let subscribers: Vec<Arc<dyn EventSubscriber>> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();

        trace!(
            job_id = %event.job_id,
            status = %event.status,
            subscribers = subscribers.len(),
            "publishing job status"
        );
        metrics::counter!(telemetry::EVENTS_PUBLISHED_TOTAL).increment(1);

        for subscriber in subscribers {
            subscriber.on_event(&event);
        }
    }
}
