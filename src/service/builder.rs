//! Builder for configuring service instances

use std::sync::Arc;

use super::Jobcast;
use crate::cache::{
    ExactMatch, SimilarityCache, SimilarityCacheConfig, SimilarityPredicate,
    retention_for_poll_interval,
};
use crate::dissemination::{DEFAULT_OBSERVER_BUFFER, Dissemination, StatusRegistryConfig};
use crate::reset::{ResetConfig, ResetScheduler, StorageBackend};
use crate::{EventBus, JobcastError, Result};

/// Default producer polling interval in minutes.
pub const DEFAULT_POLL_INTERVAL_MINUTES: u64 = 10;

/// Builder for configuring service instances.
pub struct JobcastBuilder {
    poll_interval_minutes: u64,
    cache: SimilarityCacheConfig,
    predicate: Box<dyn SimilarityPredicate>,
    status_registry: StatusRegistryConfig,
    observer_buffer: usize,
    storage: Option<Arc<dyn StorageBackend>>,
    reset: ResetConfig,
}

impl JobcastBuilder {
    pub fn new() -> Self {
        Self {
            poll_interval_minutes: DEFAULT_POLL_INTERVAL_MINUTES,
            cache: SimilarityCacheConfig::default(),
            predicate: Box::new(ExactMatch),
            status_registry: StatusRegistryConfig::default(),
            observer_buffer: DEFAULT_OBSERVER_BUFFER,
            storage: None,
            reset: ResetConfig::default(),
        }
    }

    /// Set the producers' polling interval, which fixes the similarity
    /// retention window.
    pub fn poll_interval_minutes(mut self, minutes: u64) -> Self {
        self.poll_interval_minutes = minutes;
        self
    }

    /// Configure the similarity cache bounds and sweep period.
    pub fn similarity_cache(mut self, config: SimilarityCacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Host a custom similarity predicate (default: [`ExactMatch`]).
    pub fn predicate(mut self, predicate: impl SimilarityPredicate + 'static) -> Self {
        self.predicate = Box::new(predicate);
        self
    }

    /// Configure the job status registry bounds.
    pub fn status_registry(mut self, config: StatusRegistryConfig) -> Self {
        self.status_registry = config;
        self
    }

    /// Set the per-observer buffer used by [`Jobcast::subscribe()`].
    pub fn observer_buffer(mut self, buffer: usize) -> Self {
        self.observer_buffer = buffer;
        self
    }

    /// Set the storage the reset job wipes and reseeds.
    pub fn storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Configure the daily demo reset.
    pub fn reset(mut self, config: ResetConfig) -> Self {
        self.reset = config;
        self
    }

    /// Validate the configuration and assemble the service.
    ///
    /// Nothing is scheduled until [`Jobcast::start()`].
    pub fn build(self) -> Result<Jobcast> {
        retention_for_poll_interval(self.poll_interval_minutes)?;
        if self.cache.sweep_interval.is_zero() {
            return Err(JobcastError::Configuration(
                "sweep interval must be non-zero".to_string(),
            ));
        }
        if self.observer_buffer == 0 {
            return Err(JobcastError::Configuration(
                "observer buffer must be non-zero".to_string(),
            ));
        }
        if self.reset.enabled && self.storage.is_none() {
            return Err(JobcastError::Configuration(
                "demo reset is enabled but no storage is configured".to_string(),
            ));
        }

        let cache = Arc::new(SimilarityCache::with_predicate(
            &self.cache,
            BoxedPredicate(self.predicate),
        ));
        let bus = Arc::new(EventBus::new());
        let dissemination = Arc::new(Dissemination::new(&self.status_registry));
        bus.subscribe(dissemination.clone());
        let reset = self
            .storage
            .map(|storage| Arc::new(ResetScheduler::new(storage)));

        Ok(Jobcast::new(
            cache,
            bus,
            dissemination,
            reset,
            self.reset,
            self.poll_interval_minutes,
            self.observer_buffer,
        ))
    }
}

impl Default for JobcastBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct BoxedPredicate(Box<dyn SimilarityPredicate>);

impl SimilarityPredicate for BoxedPredicate {
    fn is_similar(&self, seen: &[String], candidate: &str) -> bool {
        self.0.is_similar(seen, candidate)
    }
}
