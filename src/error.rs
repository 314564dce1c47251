//! Jobcast error types

/// Jobcast error types
#[derive(Debug, thiserror::Error)]
pub enum JobcastError {
    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Storage collaborator errors
    #[error("storage error on collection '{collection}': {message}")]
    Storage { collection: String, message: String },

    #[error("failed to enumerate collections: {0}")]
    Enumerate(String),

    #[error("baseline seeding failed: {0}")]
    Seed(String),

    // Observer transport errors
    #[error("observer connection closed")]
    ObserverClosed,

    /// The observer's outbound buffer is full; it is treated as lagging
    /// and detached rather than silently skipping events.
    #[error("observer is lagging behind")]
    ObserverLagging,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Jobcast operations
pub type Result<T> = std::result::Result<T, JobcastError>;
