//! Error types for mcreweight

use thiserror::Error;

/// mcreweight error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error (bad shapes, labels, probabilities, configuration)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error (non-finite loss, singular transform, ...)
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
