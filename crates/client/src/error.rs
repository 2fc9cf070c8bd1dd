//! Unified client error type.
//!
//! Explicit, user-initiated operations return `Result<T, ClientError>`.
//! Background work (timer refreshes, profile fetches) never surfaces
//! errors this way - it logs and degrades instead.

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors surfaced by explicit SDK operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend call failed.
    #[error("backend error: {0}")]
    Backend(BackendError),

    /// The operation requires a signed-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A unique-constraint violation (e.g., duplicate username),
    /// propagated unmodified for user-facing messaging.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Local snapshot storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<BackendError> for ClientError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict(message) => Self::Conflict(message),
            other => Self::Backend(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_lifted_out_of_backend_errors() {
        let err = ClientError::from(BackendError::Conflict("username taken".to_string()));
        assert!(matches!(err, ClientError::Conflict(message) if message == "username taken"));
    }

    #[test]
    fn test_other_backend_errors_stay_wrapped() {
        let err = ClientError::from(BackendError::NoSession);
        assert!(matches!(err, ClientError::Backend(BackendError::NoSession)));
    }
}
