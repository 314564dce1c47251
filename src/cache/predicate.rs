//! Similarity predicates hosted by the cache.
//!
//! The cache never decides what "similar" means; it only guarantees that
//! the predicate sees the full current seen-set of a job. Anything that
//! implements [`SimilarityPredicate`] can be plugged in, including plain
//! closures of the form `Fn(&[String], &str) -> bool`.

/// Decides whether a candidate value matches something already seen.
pub trait SimilarityPredicate: Send + Sync {
    /// `seen` holds every value recorded for the job so far, in insertion
    /// order. `candidate` is never empty.
    fn is_similar(&self, seen: &[String], candidate: &str) -> bool;
}

impl<F> SimilarityPredicate for F
where
    F: Fn(&[String], &str) -> bool + Send + Sync,
{
    fn is_similar(&self, seen: &[String], candidate: &str) -> bool {
        self(seen, candidate)
    }
}

/// Byte-for-byte equality. The default predicate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl SimilarityPredicate for ExactMatch {
    fn is_similar(&self, seen: &[String], candidate: &str) -> bool {
        seen.iter().any(|v| v == candidate)
    }
}

/// Equality after lowercasing and collapsing runs of whitespace.
///
/// Catches the common scraper variations ("2 Bed  Flat" vs "2 bed flat")
/// without any fuzzy scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedMatch;

impl NormalizedMatch {
    fn normalize(value: &str) -> String {
        value
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SimilarityPredicate for NormalizedMatch {
    fn is_similar(&self, seen: &[String], candidate: &str) -> bool {
        let candidate = Self::normalize(candidate);
        seen.iter().any(|v| Self::normalize(v) == candidate)
    }
}
