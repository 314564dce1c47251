//! Job identity and status types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier naming one job run.
///
/// Used as the similarity cache key and as the event-routing key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a job id from any string-like token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum JobStatus {
    /// Accepted but not started.
    Queued,
    /// Producing listings.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped before completion.
    Cancelled,
}

impl JobStatus {
    /// Whether no further status changes are expected for the job.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status change published by a job producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Arbitrary producer-defined details (progress counters, error text, ...).
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl JobStatusEvent {
    pub fn new(job_id: impl Into<JobId>, status: JobStatus, payload: serde_json::Value) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            payload,
        }
    }
}

/// Most recent known status of one job, as held by the status registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// When the registry last overwrote this record.
    pub updated_at: DateTime<Utc>,
}

impl From<&JobStatusEvent> for JobStatusRecord {
    fn from(event: &JobStatusEvent) -> Self {
        Self {
            job_id: event.job_id.clone(),
            status: event.status,
            payload: event.payload.clone(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let back: JobStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(back, JobStatus::Running);
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn job_id_is_transparent_in_json() {
        let event = JobStatusEvent::new("job-1", JobStatus::Queued, serde_json::json!({}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["job_id"], "job-1");
        assert_eq!(json["status"], "queued");
    }

    #[test]
    fn event_without_payload_deserializes_to_null() {
        let event: JobStatusEvent =
            serde_json::from_str(r#"{"job_id":"a","status":"failed"}"#).unwrap();
        assert_eq!(event.payload, serde_json::Value::Null);
        assert_eq!(event.job_id.as_str(), "a");
    }

    #[test]
    fn record_copies_event_fields() {
        let event = JobStatusEvent::new("job-9", JobStatus::Running, serde_json::json!({"n": 3}));
        let record = JobStatusRecord::from(&event);
        assert_eq!(record.job_id, event.job_id);
        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.payload["n"], 3);
    }
}
