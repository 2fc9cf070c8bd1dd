//! Backend error types.

use thiserror::Error;

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed (transport-level).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request.
    #[error("backend error ({status}): {message}")]
    Api {
        /// HTTP status code of the rejection.
        status: u16,
        /// Error body returned by the backend.
        message: String,
    },

    /// Unique-constraint violation on a row update (e.g., duplicate
    /// username).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Row or resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// JSON (de)serialization failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A response was structurally valid JSON but missing required data.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The client was constructed with an invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No session is held, so an authenticated call cannot be made.
    #[error("no active session")]
    NoSession,
}
