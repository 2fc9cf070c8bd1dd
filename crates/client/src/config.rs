//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MINTVAULT_BACKEND_URL` - Base URL of the hosted backend project
//! - `MINTVAULT_API_KEY` - Public API key sent with every request
//!
//! ## Optional
//! - `MINTVAULT_REFRESH_THRESHOLD_MINUTES` - Minutes before expiry to
//!   refresh (default: 15)
//! - `MINTVAULT_WARNING_THRESHOLD_MINUTES` - Minutes before expiry to
//!   warn (default: 5)
//! - `MINTVAULT_AUTO_REFRESH` - Arm the refresh timer (default: true)
//! - `MINTVAULT_PERSIST_SESSION` - Persist a session snapshot
//!   (default: true)
//! - `MINTVAULT_STORE_DIR` - Directory for the on-disk snapshot store
//!   (default: platform config dir, resolved by the caller)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::session::SessionConfig;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client application configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the hosted backend project.
    pub backend_url: Url,
    /// Public API key sent as the `apikey` header.
    pub api_key: SecretString,
    /// Minutes-before-expiry thresholds and persistence flags for the
    /// session lifecycle.
    pub session: SessionConfig,
    /// Directory for the on-disk snapshot store, when overridden.
    pub store_dir: Option<PathBuf>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("backend_url", &self.backend_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("session", &self.session)
            .field("store_dir", &self.store_dir)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend_url = get_required_env("MINTVAULT_BACKEND_URL")?;
        let backend_url = Url::parse(&backend_url).map_err(|e| {
            ConfigError::InvalidEnvVar("MINTVAULT_BACKEND_URL".to_string(), e.to_string())
        })?;
        let api_key = SecretString::from(get_required_env("MINTVAULT_API_KEY")?);

        let refresh_threshold =
            parse_minutes("MINTVAULT_REFRESH_THRESHOLD_MINUTES", &get_env_or_default(
                "MINTVAULT_REFRESH_THRESHOLD_MINUTES",
                "15",
            ))?;
        let warning_threshold =
            parse_minutes("MINTVAULT_WARNING_THRESHOLD_MINUTES", &get_env_or_default(
                "MINTVAULT_WARNING_THRESHOLD_MINUTES",
                "5",
            ))?;
        let auto_refresh = parse_bool(
            "MINTVAULT_AUTO_REFRESH",
            &get_env_or_default("MINTVAULT_AUTO_REFRESH", "true"),
        )?;
        let persist = parse_bool(
            "MINTVAULT_PERSIST_SESSION",
            &get_env_or_default("MINTVAULT_PERSIST_SESSION", "true"),
        )?;

        let store_dir = get_optional_env("MINTVAULT_STORE_DIR").map(PathBuf::from);

        Ok(Self {
            backend_url,
            api_key,
            session: SessionConfig {
                refresh_threshold,
                warning_threshold,
                auto_refresh,
                persist,
            },
            store_dir,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a whole-minutes value into a [`Duration`].
fn parse_minutes(var_name: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(|minutes| Duration::from_secs(minutes * 60))
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))
}

/// Parse a boolean flag; accepts `true`/`false`/`1`/`0`.
fn parse_bool(var_name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("expected true/false, got {other}"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minutes() {
        assert_eq!(
            parse_minutes("TEST_VAR", "15").unwrap(),
            Duration::from_secs(900)
        );
        assert_eq!(parse_minutes("TEST_VAR", "0").unwrap(), Duration::ZERO);
        assert!(parse_minutes("TEST_VAR", "soon").is_err());
        assert!(parse_minutes("TEST_VAR", "-5").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TEST_VAR", "true").unwrap());
        assert!(parse_bool("TEST_VAR", "1").unwrap());
        assert!(!parse_bool("TEST_VAR", "false").unwrap());
        assert!(!parse_bool("TEST_VAR", "0").unwrap());
        assert!(parse_bool("TEST_VAR", "TRUE").unwrap());
        assert!(parse_bool("TEST_VAR", "yes").is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ClientConfig {
            backend_url: Url::parse("https://project.example.co").unwrap(),
            api_key: SecretString::from("super_secret_api_key"),
            session: SessionConfig::default(),
            store_dir: None,
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_api_key"));
        assert!(debug_output.contains("project.example.co"));
    }
}
