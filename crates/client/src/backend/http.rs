//! HTTP implementation of the backend capability.
//!
//! Speaks the hosted service's three surfaces:
//!
//! - `/auth/v1` - password/refresh token grants, sign-up, logout
//! - `/rest/v1/profiles` - the profile row store (filter queries, patches)
//! - `/rest/v1/rpc/{name}` - remote procedures (bids, preferences, XP)
//!
//! The client holds the current session in-process and broadcasts
//! auth-change events to subscribers; callers that persist sessions do so
//! through [`crate::session::SessionManager`], not here.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use mintvault_core::{Email, IdentityMetadata, Session, UserId, UserIdentity};

use crate::backend::{AuthEvent, AuthSignal, Backend, BackendError, ProfilePatch, ProfileRow, jwt};
use crate::config::ClientConfig;

/// Broadcast channel capacity for auth state change events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: Uuid,
    email: String,
    #[serde(default)]
    user_metadata: IdentityMetadata,
}

impl WireUser {
    fn into_identity(self) -> Result<UserIdentity, BackendError> {
        let email = Email::parse(&self.email).map_err(|e| {
            BackendError::UnexpectedResponse(format!("unparseable identity email: {e}"))
        })?;
        Ok(UserIdentity {
            id: UserId::new(self.id),
            email,
            metadata: self.user_metadata,
        })
    }
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a IdentityMetadata>,
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Backend
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for the hosted marketplace backend.
///
/// Cheap to clone; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    http: reqwest::Client,
    auth_url: Url,
    rest_url: Url,
    api_key: String,
    session: RwLock<Option<Session>>,
    event_tx: broadcast::Sender<AuthSignal>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("auth_url", &self.inner.auth_url.as_str())
            .field("rest_url", &self.inner.rest_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    /// Create a backend client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidConfig`] if the backend URL cannot
    /// host the auth/REST paths or the API key is not header-safe.
    pub fn new(config: &ClientConfig) -> Result<Self, BackendError> {
        let api_key = config.api_key.expose_secret().to_string();
        let base = config.backend_url.as_str().trim_end_matches('/');
        let auth_url = Url::parse(&format!("{base}/auth/v1/"))
            .map_err(|e| BackendError::InvalidConfig(format!("auth url: {e}")))?;
        let rest_url = Url::parse(&format!("{base}/rest/v1/"))
            .map_err(|e| BackendError::InvalidConfig(format!("rest url: {e}")))?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            "apikey",
            HeaderValue::from_str(&api_key)
                .map_err(|e| BackendError::InvalidConfig(format!("invalid API key: {e}")))?,
        );
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()?;

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                http,
                auth_url,
                rest_url,
                api_key,
                session: RwLock::new(None),
                event_tx,
            }),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Credential Flows
    // ─────────────────────────────────────────────────────────────────────

    /// Sign in with email and password.
    ///
    /// Stores the resulting session and emits [`AuthEvent::SignedIn`].
    ///
    /// # Errors
    ///
    /// Returns an API error if the credentials are rejected.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let url = self.auth_endpoint("token?grant_type=password")?;
        let response = self
            .inner
            .http
            .post(url)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let token: TokenResponse = response.json().await?;
        let session = session_from_token_response(token)?;
        self.store_session(session.clone(), AuthEvent::SignedIn)
            .await;
        Ok(session)
    }

    /// Register a new account.
    ///
    /// Returns the session when the backend signs the account in
    /// immediately, or `None` when email confirmation is required first.
    ///
    /// # Errors
    ///
    /// Returns an API error if registration is rejected (e.g., the email
    /// is already in use).
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<&IdentityMetadata>,
    ) -> Result<Option<Session>, BackendError> {
        let url = self.auth_endpoint("signup")?;
        let response = self
            .inner
            .http
            .post(url)
            .json(&SignUpRequest {
                email,
                password,
                data: metadata,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        // Confirmation-required responses carry a user but no tokens.
        let body: serde_json::Value = response.json().await?;
        if body.get("access_token").is_none() {
            debug!("sign-up accepted, confirmation required");
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(body)?;
        let session = session_from_token_response(token)?;
        self.store_session(session.clone(), AuthEvent::SignedIn)
            .await;
        Ok(Some(session))
    }

    /// Adopt an externally restored session (e.g., from a persisted
    /// snapshot) and emit [`AuthEvent::SignedIn`].
    pub async fn set_session(&self, session: Session) {
        self.store_session(session, AuthEvent::SignedIn).await;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn auth_endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.inner
            .auth_url
            .join(path)
            .map_err(|e| BackendError::InvalidConfig(format!("auth endpoint {path}: {e}")))
    }

    fn rest_endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.inner
            .rest_url
            .join(path)
            .map_err(|e| BackendError::InvalidConfig(format!("rest endpoint {path}: {e}")))
    }

    async fn store_session(&self, session: Session, event: AuthEvent) {
        {
            let mut held = self.inner.session.write().await;
            *held = Some(session.clone());
        }
        self.emit(event, Some(session));
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        // No subscribers yet is fine.
        let _ = self.inner.event_tx.send(AuthSignal { event, session });
    }

    async fn bearer(&self) -> String {
        let held = self.inner.session.read().await;
        match held.as_ref() {
            Some(session) => format!("Bearer {}", session.access_token),
            None => format!("Bearer {}", self.inner.api_key),
        }
    }
}

/// Build a [`Session`] from a token-grant response.
fn session_from_token_response(token: TokenResponse) -> Result<Session, BackendError> {
    let now = Utc::now().timestamp();
    let user = token
        .user
        .ok_or_else(|| {
            BackendError::UnexpectedResponse("token response carries no user".to_string())
        })?
        .into_identity()?;
    // Prefer the explicit expiry; fall back to the JWT's own claim, then
    // to the relative lifetime.
    let expires_at = token
        .expires_at
        .or_else(|| jwt::peek_claims(&token.access_token).and_then(|c| c.exp))
        .or_else(|| token.expires_in.map(|secs| now + secs))
        .ok_or_else(|| {
            BackendError::UnexpectedResponse("token response carries no expiry".to_string())
        })?;
    Ok(Session {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at,
        obtained_at: now,
        user,
    })
}

/// Map a non-success response to a [`BackendError`].
async fn reject(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    match status {
        StatusCode::CONFLICT => BackendError::Conflict(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.inner.session.read().await.clone())
    }

    async fn refresh_session(&self) -> Result<Session, BackendError> {
        let refresh_token = {
            let held = self.inner.session.read().await;
            held.as_ref()
                .map(|s| s.refresh_token.clone())
                .ok_or(BackendError::NoSession)?
        };

        let url = self.auth_endpoint("token?grant_type=refresh_token")?;
        let response = self
            .inner
            .http
            .post(url)
            .json(&RefreshGrant {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let token: TokenResponse = response.json().await?;
        let session = session_from_token_response(token)?;
        self.store_session(session.clone(), AuthEvent::TokenRefreshed)
            .await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let held = { self.inner.session.write().await.take() };
        self.emit(AuthEvent::SignedOut, None);

        // Revoke remotely on a best-effort basis; the local session is
        // already gone either way.
        if let Some(session) = held {
            let url = self.auth_endpoint("logout")?;
            let result = self
                .inner
                .http
                .post(url)
                .header("Authorization", format!("Bearer {}", session.access_token))
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    warn!(status = %response.status(), "remote logout rejected");
                }
                Err(error) => warn!(%error, "remote logout failed"),
                Ok(_) => {}
            }
        }
        Ok(())
    }

    async fn fetch_profile_row(&self, user_id: UserId) -> Result<Option<ProfileRow>, BackendError> {
        let url = self.rest_endpoint("profiles")?;
        let response = self
            .inner
            .http
            .get(url)
            .header("Authorization", self.bearer().await)
            .query(&[("id", format!("eq.{user_id}")), ("select", "*".to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let mut rows: Vec<ProfileRow> = response.json().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn update_profile_row(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> Result<ProfileRow, BackendError> {
        let url = self.rest_endpoint("profiles")?;
        let response = self
            .inner
            .http
            .patch(url)
            .header("Authorization", self.bearer().await)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{user_id}"))])
            .json(patch)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let mut rows: Vec<ProfileRow> = response.json().await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(format!("profile {user_id}")));
        }
        Ok(rows.swap_remove(0))
    }

    async fn call_procedure(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let url = self.rest_endpoint(&format!("rpc/{name}"))?;
        let response = self
            .inner
            .http
            .post(url)
            .header("Authorization", self.bearer().await)
            .json(&args)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        Ok(response.json().await?)
    }

    fn events(&self) -> broadcast::Receiver<AuthSignal> {
        self.inner.event_tx.subscribe()
    }
}
