//! Error types for crpt-submit.

use std::time::Duration;

use thiserror::Error;

/// Main error type for submission and rate limiting operations.
#[derive(Error, Debug)]
pub enum CrptError {
    /// Rejected limiter or client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The rate limiter was shut down while the caller was waiting for admission
    #[error("Rate limiter was shut down")]
    Cancelled,

    /// Admission was not granted within the caller's bound
    #[error("Timed out after {0:?} waiting for rate limiter admission")]
    TimedOut(Duration),

    /// The signature cannot be carried in an HTTP header; no request was sent
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The document could not be encoded; no request was sent
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request never produced an HTTP response
    #[error("Transport error: {reason}")]
    Transport {
        /// Status code, when the failure happened after headers arrived
        status: Option<u16>,
        reason: String,
    },

    /// Configuration file or environment errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for CrptError {
    fn from(err: reqwest::Error) -> Self {
        CrptError::Transport {
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for CrptError {
    fn from(err: config::ConfigError) -> Self {
        CrptError::Config(err.to_string())
    }
}

/// Result type alias for crpt-submit operations.
pub type Result<T> = std::result::Result<T, CrptError>;
