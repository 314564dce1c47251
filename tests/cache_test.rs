//! Tests for [`SimilarityCache`]: per-job similarity entries and eviction.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use jobcast::cache::DEFAULT_RETENTION;
use jobcast::{JobId, NormalizedMatch, SimilarityCache, SimilarityCacheConfig};

fn cache() -> SimilarityCache {
    SimilarityCache::new(&SimilarityCacheConfig::default())
}

#[test]
fn unknown_job_is_never_similar() {
    let cache = cache();
    assert!(!cache.is_similar(&JobId::new("never-seen"), "anything"));
    assert!(!cache.contains(&JobId::new("never-seen")));
}

#[test]
fn recorded_value_is_similar_to_itself() {
    let cache = cache();
    let job = JobId::new("job-1");
    for value in ["12 Acacia Ave", "3 Mill Lane", "Flat 2, High St"] {
        cache.record_value(&job, value);
        assert!(cache.is_similar(&job, value), "false negative for {value}");
    }
    assert!(!cache.is_similar(&job, "99 Nowhere Rd"));
}

#[test]
fn empty_value_never_creates_entry() {
    let cache = cache();
    let job = JobId::new("job-1");
    cache.record_value(&job, "");

    assert!(!cache.contains(&job));
    assert!(!cache.is_similar(&job, ""));
    assert!(cache.is_empty());
}

#[test]
fn jobs_are_independent() {
    let cache = cache();
    let a = JobId::new("a");
    let b = JobId::new("b");
    cache.record_value(&a, "listing");

    assert!(cache.is_similar(&a, "listing"));
    assert!(!cache.is_similar(&b, "listing"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn custom_predicate_is_hosted() {
    let cache = SimilarityCache::with_predicate(&SimilarityCacheConfig::default(), NormalizedMatch);
    let job = JobId::new("job-1");
    cache.record_value(&job, "2 Bed  Flat");

    assert!(cache.is_similar(&job, "2 bed flat"));
}

#[test]
fn predicate_sees_full_seen_set() {
    let cache = SimilarityCache::with_predicate(
        &SimilarityCacheConfig::default(),
        |seen: &[String], _candidate: &str| seen.len() >= 3,
    );
    let job = JobId::new("job-1");
    cache.record_value(&job, "a");
    cache.record_value(&job, "b");
    assert!(!cache.is_similar(&job, "x"));
    cache.record_value(&job, "c");
    assert!(cache.is_similar(&job, "x"));
}

#[test]
fn concurrent_records_lose_nothing() {
    let cache = Arc::new(cache());
    let job = JobId::new("shared");
    let mut handles = Vec::new();

    for producer in 0..8 {
        let cache = Arc::clone(&cache);
        let job = job.clone();
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                cache.record_value(&job, &format!("p{producer}-v{i}"));
            }
        }));
    }

    for h in handles {
        h.join().expect("thread panicked");
    }

    let entry = cache.entry(&job).expect("entry exists");
    assert_eq!(entry.len(), 800);
    assert!(cache.is_similar(&job, "p7-v99"));
}

#[test]
fn full_cache_admits_new_job() {
    let cache = SimilarityCache::new(&SimilarityCacheConfig::new().max_entries(2));
    let warm = [JobId::new("warm-0"), JobId::new("warm-1")];
    for job in &warm {
        cache.record_value(job, "listing-0");
    }
    for _ in 0..20 {
        for job in &warm {
            assert!(cache.is_similar(job, "listing-0"));
        }
    }

    let fresh = JobId::new("fresh");
    cache.record_value(&fresh, "listing-1");
    assert!(cache.is_similar(&fresh, "listing-1"));
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&fresh));
}

#[test]
fn full_cache_drops_least_recently_used_job() {
    let cache = SimilarityCache::new(&SimilarityCacheConfig::new().max_entries(2));
    let (a, b, c) = (JobId::new("a"), JobId::new("b"), JobId::new("c"));
    cache.record_value(&a, "x");
    cache.record_value(&b, "x");
    assert_eq!(cache.len(), 2);

    // Touch `a` so `b` becomes the oldest.
    assert!(cache.is_similar(&a, "x"));
    cache.record_value(&c, "x");

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&a));
    assert!(!cache.contains(&b));
    assert!(cache.contains(&c));
}

#[tokio::test(start_paused = true)]
async fn entry_evicted_after_retention_plus_sweep_period() {
    let cache = cache();
    let retention = cache.initialize(2).unwrap();
    assert_eq!(retention, Duration::from_millis(60_000));

    let job = JobId::new("job-1");
    cache.record_value(&job, "a");

    tokio::time::sleep(Duration::from_secs(55)).await;
    assert!(cache.contains(&job), "evicted before retention elapsed");

    // 60s retention + one 10s sweep period
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert!(!cache.contains(&job));
    assert!(!cache.is_similar(&job, "a"));

    cache.stop();
}

#[tokio::test(start_paused = true)]
async fn activity_does_not_extend_lifetime() {
    let cache = cache();
    cache.initialize(2).unwrap();
    let job = JobId::new("busy");

    cache.record_value(&job, "v0");
    for i in 1..=5 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        cache.record_value(&job, &format!("v{i}"));
        assert!(cache.is_similar(&job, "v0"));
    }

    tokio::time::sleep(Duration::from_secs(21)).await;
    assert!(!cache.contains(&job));
    cache.stop();
}

#[tokio::test(start_paused = true)]
async fn new_entry_after_eviction_starts_fresh() {
    let cache = cache();
    cache.initialize(1).unwrap();
    let job = JobId::new("job-1");

    cache.record_value(&job, "old");
    tokio::time::sleep(Duration::from_secs(41)).await;
    assert!(!cache.contains(&job));

    cache.record_value(&job, "new");
    assert!(cache.is_similar(&job, "new"));
    assert!(!cache.is_similar(&job, "old"));
    cache.stop();
}

#[tokio::test(start_paused = true)]
async fn manual_sweep_uses_default_retention_before_initialize() {
    let cache = cache();
    let job = JobId::new("job-1");
    cache.record_value(&job, "a");

    tokio::time::advance(DEFAULT_RETENTION).await;
    assert_eq!(cache.sweep_expired(), 0);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(cache.sweep_expired(), 1);
    assert!(!cache.contains(&job));
}

#[tokio::test(start_paused = true)]
async fn reinitialize_replaces_sweep() {
    let cache = cache();
    cache.initialize(30).unwrap();
    assert_eq!(cache.retention(), DEFAULT_RETENTION);

    let retention = cache.initialize(2).unwrap();
    assert_eq!(cache.retention(), retention);
    assert!(cache.is_running());

    let job = JobId::new("job-1");
    cache.record_value(&job, "a");
    tokio::time::sleep(Duration::from_secs(71)).await;
    assert!(!cache.contains(&job));
    cache.stop();
}

#[tokio::test(start_paused = true)]
async fn invalid_reinitialize_keeps_running_sweep() {
    let cache = cache();
    cache.initialize(2).unwrap();

    assert!(cache.initialize(0).is_err());
    assert!(cache.is_running());
    assert_eq!(cache.retention(), Duration::from_secs(60));
    cache.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_keeps_contents() {
    let cache = cache();
    cache.initialize(2).unwrap();
    let job = JobId::new("job-1");
    cache.record_value(&job, "a");

    cache.stop();
    cache.stop();
    assert!(!cache.is_running());

    // No sweep runs any more
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(cache.contains(&job));
}

#[tokio::test]
async fn zero_sweep_interval_is_rejected() {
    let cache = SimilarityCache::new(&SimilarityCacheConfig::new().sweep_interval(Duration::ZERO));
    assert!(cache.initialize(2).is_err());
    assert!(!cache.is_running());
}
