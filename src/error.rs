//! Error types for PostClone
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while configuring a cloned instance
#[derive(Debug, Error)]
pub enum PostCloneError {
    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record addressed by id does not exist
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Property store rejected a read or write
    #[error("Property error: {0}")]
    Property(String),

    /// Invalid orchestrator configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for PostClone operations
pub type Result<T> = std::result::Result<T, PostCloneError>;
