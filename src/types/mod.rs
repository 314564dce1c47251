//! Public types for the Jobcast API.

mod job;
mod observer;

pub use job::{JobId, JobStatus, JobStatusEvent, JobStatusRecord};
pub use observer::{ObserverId, ObserverMessage};
