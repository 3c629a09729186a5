//! Error types for checkpoint operations.

use thiserror::Error;

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur while saving, loading, or listing checkpoints.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint exists for the given run/step.
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// Checkpoint contents could not be parsed into a value the caller
    /// requested.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary (bincode) encode/decode failure.
    #[error("binary serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),

    /// Storage backend failed (in-memory saver never returns this; it
    /// exists for the trait's other implementors).
    #[error("storage error: {0}")]
    Storage(String),

    /// Checkpoint was structurally invalid (e.g. referenced an executor id
    /// that was never instantiated).
    #[error("invalid checkpoint: {0}")]
    Invalid(String),

    /// Underlying I/O failure from a storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for backend-defined failures.
    #[error("{0}")]
    Custom(String),
}
