//! Error types for the dashboard client.

use runscope_core::LoadError;
use thiserror::Error;

/// Errors that can occur when talking to the dashboard API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client could not be configured (bad base URL, etc).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("server returned HTTP {status} for {path}")]
    Server { status: u16, path: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<ClientError> for LoadError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(what) => LoadError::NotFound(what),
            other => LoadError::ServerError(other.to_string()),
        }
    }
}
