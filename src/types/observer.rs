//! Messages delivered to observers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{JobStatusEvent, JobStatusRecord};

/// Handle identifying one attached observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObserverId(pub(crate) u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// What an observer receives over its push channel.
///
/// Every observer gets exactly one `Snapshot` on attach, followed by a
/// `Status` for each event published after that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObserverMessage {
    /// Last known status of every tracked job, ordered by job id.
    Snapshot { jobs: Vec<JobStatusRecord> },
    /// A single status change, in publication order.
    Status(JobStatusEvent),
}
