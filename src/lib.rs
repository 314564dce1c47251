//! Jobcast - job status dissemination with per-job similarity caching
//!
//! This crate tracks long-running background jobs (scrapes, imports, ...)
//! from the producer side:
//!
//! - a [`SimilarityCache`] lets a producer skip near-duplicate values
//!   within one job run, with entries evicted a fixed time after creation;
//! - an [`EventBus`] carries job status changes to a [`Dissemination`]
//!   service that replays the current state to newly attached observers
//!   and forwards every later change in order;
//! - a [`ResetScheduler`] wipes and reseeds storage once a day in demo
//!   mode.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use jobcast::{Jobcast, JobStatus, ObserverMessage};
//!
//! #[tokio::main]
//! async fn main() -> jobcast::Result<()> {
//!     let service = Jobcast::builder().poll_interval_minutes(5).build()?;
//!     service.start()?;
//!
//!     let mut observer = service.subscribe()?;
//!     service.publish("import-1", JobStatus::Running, serde_json::json!({}));
//!
//!     while let Some(message) = observer.next().await {
//!         if let ObserverMessage::Status(event) = message {
//!             println!("{} is {}", event.job_id, event.status);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod cache;
pub mod dissemination;
pub mod error;
pub mod reset;
#[cfg(feature = "server")]
pub mod server;
pub mod service;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use bus::{EventBus, EventSubscriber, SubscriberId};
pub use cache::{
    ExactMatch, NormalizedMatch, SimilarityCache, SimilarityCacheConfig, SimilarityEntry,
    SimilarityPredicate,
};
pub use dissemination::{ChannelSink, Dissemination, ObserverSink, ObserverStream, StatusRegistryConfig};
pub use error::{JobcastError, Result};
pub use reset::{MemoryStorage, ResetConfig, ResetHandle, ResetReport, ResetScheduler, StorageBackend};
pub use service::{Jobcast, JobcastBuilder};
pub use types::{JobId, JobStatus, JobStatusEvent, JobStatusRecord, ObserverId, ObserverMessage};

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
