//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;

use jobcast::telemetry;
use jobcast::{
    ChannelSink, Dissemination, EventBus, JobId, JobStatus, MemoryStorage, ResetScheduler,
    SimilarityCache, SimilarityCacheConfig,
};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for a name whose label `label` equals `value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn similarity_checks_are_labelled_by_result() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let cache = SimilarityCache::new(&SimilarityCacheConfig::default());
        let job = JobId::new("job-1");
        cache.record_value(&job, "a");
        cache.record_value(&job, "a");
        cache.is_similar(&job, "a");
        cache.is_similar(&job, "b");
        cache.is_similar(&JobId::new("other"), "a");
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::VALUES_RECORDED_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::SIMILARITY_CHECKS_TOTAL, "result", "similar"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::SIMILARITY_CHECKS_TOTAL, "result", "distinct"),
        2
    );
}

#[test]
fn capacity_evictions_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let cache = SimilarityCache::new(&SimilarityCacheConfig::new().max_entries(1));
        cache.record_value(&JobId::new("job-1"), "a");
        cache.record_value(&JobId::new("job-2"), "a");
        assert_eq!(cache.len(), 1);
        // Explicit removals are not capacity evictions.
        cache.clear();
        assert!(cache.is_empty());
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_EVICTIONS_TOTAL, "cause", "capacity"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_EVICTIONS_TOTAL, "cause", "expired"),
        0
    );
}

#[test]
fn lagging_observer_counts_send_failure() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let bus = EventBus::new();
        let dissemination = Arc::new(Dissemination::default());
        bus.subscribe(dissemination.clone());

        let (sink, rx) = ChannelSink::new(1);
        dissemination.attach(Arc::new(sink)).unwrap();
        // Buffer holds the snapshot; the next send finds it full.
        bus.publish("job-1", JobStatus::Running, json!(null));
        drop(rx);
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::EVENTS_PUBLISHED_TOTAL), 1);
    assert_eq!(
        counter_with_label(
            &snapshot,
            telemetry::OBSERVER_SEND_FAILURES_TOTAL,
            "reason",
            "lagging"
        ),
        1
    );
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn reset_counts_collection_failures() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let report = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let storage = Arc::new(MemoryStorage::new());
                storage.insert("jobs", json!({}));
                storage.insert("listings", json!({}));
                storage.fail_drops_of("jobs");
                ResetScheduler::new(storage).run_once().await
            })
        })
    });
    assert!(report.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_total(&snapshot, telemetry::RESET_COLLECTION_FAILURES_TOTAL),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::RESET_RUNS_TOTAL, "status", "ok"),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let cache = SimilarityCache::new(&SimilarityCacheConfig::default());
    cache.record_value(&JobId::new("job"), "v");
    assert!(cache.is_similar(&JobId::new("job"), "v"));
}
