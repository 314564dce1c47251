//! End-to-end tests for the assembled [`Jobcast`] service.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;

use jobcast::{
    JobId, JobStatus, Jobcast, JobcastError, MemoryStorage, NormalizedMatch, ObserverMessage,
    ResetConfig, SimilarityCacheConfig,
};

#[test]
fn zero_poll_interval_fails_fast() {
    let result = Jobcast::builder().poll_interval_minutes(0).build();
    assert!(matches!(result, Err(JobcastError::Configuration(_))));
}

#[test]
fn demo_mode_without_storage_is_rejected() {
    let result = Jobcast::builder()
        .reset(ResetConfig::new().enabled(true))
        .build();
    let Err(err) = result else {
        panic!("expected configuration error");
    };
    assert!(err.to_string().contains("no storage"));
}

#[test]
fn zero_observer_buffer_is_rejected() {
    let result = Jobcast::builder().observer_buffer(0).build();
    assert!(matches!(result, Err(JobcastError::Configuration(_))));
}

#[tokio::test]
async fn producer_flow_dedups_and_notifies() {
    let service = Jobcast::builder()
        .poll_interval_minutes(2)
        .predicate(NormalizedMatch)
        .build()
        .unwrap();
    service.start().unwrap();
    assert_eq!(service.cache().retention(), Duration::from_secs(60));

    let mut observer = service.subscribe().unwrap();
    let job = JobId::new("import-7");
    let scraped = ["12 Acacia Ave", "3 Mill Lane", "12  ACACIA ave", "3 mill lane"];

    let mut kept = 0;
    for value in scraped {
        if !service.is_similar(&job, value) {
            service.record_value(&job, value);
            kept += 1;
        }
    }
    assert_eq!(kept, 2);

    service.publish(job.clone(), JobStatus::Completed, json!({"listings": kept}));

    assert!(matches!(
        observer.next().await,
        Some(ObserverMessage::Snapshot { jobs }) if jobs.is_empty()
    ));
    match observer.next().await {
        Some(ObserverMessage::Status(event)) => {
            assert_eq!(event.job_id, job);
            assert_eq!(event.status, JobStatus::Completed);
            assert_eq!(event.payload["listings"], 2);
        }
        other => panic!("expected status, got {other:?}"),
    }

    service.shutdown();
}

#[tokio::test]
async fn start_and_shutdown_are_repeatable() {
    let storage = Arc::new(MemoryStorage::new());
    let service = Jobcast::builder()
        .storage(storage)
        .reset(ResetConfig::new().enabled(true))
        .build()
        .unwrap();

    service.start().unwrap();
    service.start().unwrap();
    assert!(service.cache().is_running());
    assert!(service.reset_scheduled());

    service.shutdown();
    service.shutdown();
    assert!(!service.cache().is_running());
    assert!(!service.reset_scheduled());
}

#[tokio::test]
async fn reset_not_scheduled_without_demo_mode() {
    let service = Jobcast::builder()
        .storage(Arc::new(MemoryStorage::new()))
        .build()
        .unwrap();
    service.start().unwrap();
    assert!(!service.reset_scheduled());
    service.shutdown();
}

#[tokio::test]
async fn manual_reset_leaves_in_memory_state_alone() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("listings", json!({"id": 1}));
    let service = Jobcast::builder()
        .storage(storage.clone())
        .build()
        .unwrap();

    let job = JobId::new("job-1");
    service.record_value(&job, "listing-1");
    service.publish(job.clone(), JobStatus::Running, json!(null));

    let report = service.run_reset().await.unwrap();
    assert_eq!(report.dropped, vec!["listings"]);
    assert!(!storage.has_collection("listings"));

    // Accepted inconsistency: in-memory state for the job survives the wipe.
    assert!(service.is_similar(&job, "listing-1"));
    assert!(service.dissemination().status(&job).is_some());
}

#[tokio::test]
async fn manual_reset_without_storage_fails() {
    let service = Jobcast::builder().build().unwrap();
    let err = service.run_reset().await.unwrap_err();
    assert!(matches!(err, JobcastError::Configuration(_)));
}

#[tokio::test(start_paused = true)]
async fn cache_config_flows_through_builder() {
    let service = Jobcast::builder()
        .poll_interval_minutes(1)
        .similarity_cache(SimilarityCacheConfig::new().sweep_interval(Duration::from_secs(1)))
        .build()
        .unwrap();
    service.start().unwrap();

    let job = JobId::new("job-1");
    service.record_value(&job, "a");
    // 30s retention + 1s sweep period
    tokio::time::sleep(Duration::from_secs(32)).await;
    assert!(!service.cache().contains(&job));

    service.shutdown();
}
