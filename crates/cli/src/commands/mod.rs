//! CLI command implementations and shared wiring.

pub mod account;
pub mod bid;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use mintvault_client::backend::{Backend, BackendError, HttpBackend};
use mintvault_client::{
    ClientConfig, ClientError, ConfigError, FileStore, SessionManager, SnapshotStore, StoreError,
};
use mintvault_core::Session;

/// Errors that can occur while running a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An SDK operation failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The local snapshot store failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// No persisted session; the user has to log in first.
    #[error("not signed in - run `mintvault login` first")]
    NotSignedIn,

    /// Terminal I/O failed (e.g., the password prompt).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared wiring for commands: configuration, backend, snapshot store.
pub struct CliContext {
    /// Loaded client configuration.
    pub config: ClientConfig,
    /// HTTP backend for the configured project.
    pub backend: Arc<HttpBackend>,
    /// On-disk snapshot store.
    pub store: Arc<FileStore>,
}

impl CliContext {
    /// Build the context from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] or [`CliError::Backend`] when the
    /// environment is incomplete or invalid.
    pub fn from_env() -> Result<Self, CliError> {
        let config = ClientConfig::from_env()?;
        let backend = Arc::new(HttpBackend::new(&config)?);
        let store = Arc::new(FileStore::new(store_dir(&config)));
        Ok(Self {
            config,
            backend,
            store,
        })
    }

    /// A session manager over this context's backend and store.
    #[must_use]
    pub fn manager(&self) -> SessionManager {
        SessionManager::new(
            Arc::clone(&self.backend) as Arc<dyn Backend>,
            Arc::clone(&self.store) as Arc<dyn SnapshotStore>,
            self.config.session.clone(),
        )
    }

    /// Read the persisted session (without arming timers) and hand it
    /// to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::NotSignedIn`] when no usable snapshot exists.
    pub async fn restore_session(&self) -> Result<Session, CliError> {
        let session = self
            .manager()
            .peek_persisted()?
            .ok_or(CliError::NotSignedIn)?;
        self.backend.set_session(session.clone()).await;
        Ok(session)
    }
}

/// Resolve the snapshot store directory: explicit override, then the
/// platform config dir, then a dotdir in the working directory.
fn store_dir(config: &ClientConfig) -> PathBuf {
    config
        .store_dir
        .clone()
        .or_else(|| dirs::config_dir().map(|dir| dir.join("mintvault")))
        .unwrap_or_else(|| PathBuf::from(".mintvault"))
}
