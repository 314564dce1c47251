//! Telemetry metric name constants.
//!
//! Centralised metric names for jobcast operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `jobcast_`. Counters end in `_total`,
//! gauges describe a current quantity.
//!
//! # Common labels
//!
//! - `result`: similarity check outcome: "similar" or "distinct"
//! - `status`: outcome: "ok" or "error"
//! - `reason`: observer removal cause: "closed" or "lagging"
//! - `cause`: similarity entry removal cause: "expired" or "capacity"

/// Total similarity checks answered by the cache.
///
/// Labels: `result` ("similar" | "distinct").
pub const SIMILARITY_CHECKS_TOTAL: &str = "jobcast_similarity_checks_total";

/// Total values recorded into per-job similarity entries.
pub const VALUES_RECORDED_TOTAL: &str = "jobcast_values_recorded_total";

/// Total similarity entries removed, by the eviction sweep or because the
/// cache was full.
///
/// Labels: `cause` ("expired" | "capacity").
pub const CACHE_EVICTIONS_TOTAL: &str = "jobcast_cache_evictions_total";

/// Total job status events published on the bus.
pub const EVENTS_PUBLISHED_TOTAL: &str = "jobcast_events_published_total";

/// Number of currently attached observers.
pub const OBSERVERS_ATTACHED: &str = "jobcast_observers_attached";

/// Total observers removed because a send failed.
///
/// Labels: `reason` ("closed" | "lagging").
pub const OBSERVER_SEND_FAILURES_TOTAL: &str = "jobcast_observer_send_failures_total";

/// Total reset runs.
///
/// Labels: `status` ("ok" | "error").
pub const RESET_RUNS_TOTAL: &str = "jobcast_reset_runs_total";

/// Total collections that failed to drop during a reset.
pub const RESET_COLLECTION_FAILURES_TOTAL: &str = "jobcast_reset_collection_failures_total";
