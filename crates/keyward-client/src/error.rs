//! Client error types.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure; the request may be retried.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response other than an authentication failure.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error detail from server.
        code: String,
        /// Error message from server.
        message: String,
    },

    /// The server rejected the credential. The session has been cleared.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// No live session; the caller must not continue.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The session medium refused a write.
    #[error("Session storage error: {0}")]
    Storage(#[from] keyward_session::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }

    /// Check if this error means there is no usable session.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Unauthenticated(_) | Error::NotAuthenticated)
    }

    /// Check if retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if the session medium could not be written.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Error::Storage(e) if e.is_storage_unavailable())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
