//! Error types for invalidation operations

use thiserror::Error;

use crate::state_machine::TransitionError;

/// Errors that can occur while deriving, dispatching or transporting invalidations
#[derive(Debug, Error)]
pub enum InvalidatorError {
    /// Configuration error (missing mandatory field, malformed value)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rule or filter pattern failed to compile
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Repository path could not be mapped or externalized
    #[error("Path resolution error: {0}")]
    Resolution(String),

    /// Derivation work could not complete on the worker pool
    #[error("Derivation error: {0}")]
    Derivation(String),

    /// Request signing error
    #[error("Request signing error: {0}")]
    Signing(String),

    /// HTTP transport error
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// NATS connection error
    #[error("NATS connection error: {0}")]
    NatsConnection(String),

    /// NATS publish error
    #[error("NATS publish error: {0}")]
    NatsPublish(String),

    /// NATS subscribe error
    #[error("NATS subscribe error: {0}")]
    NatsSubscribe(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Job lifecycle received a signal it cannot accept
    #[error("Job lifecycle error: {0}")]
    InvalidTransition(#[from] TransitionError),
}

/// Result type for invalidation operations
pub type InvalidatorResult<T> = Result<T, InvalidatorError>;

impl From<async_nats::Error> for InvalidatorError {
    fn from(err: async_nats::Error) -> Self {
        InvalidatorError::NatsConnection(err.to_string())
    }
}

impl From<serde_json::Error> for InvalidatorError {
    fn from(err: serde_json::Error) -> Self {
        InvalidatorError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for InvalidatorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InvalidatorError::Timeout(err.to_string())
        } else {
            InvalidatorError::Transport(err.to_string())
        }
    }
}
