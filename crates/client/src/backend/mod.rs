//! Hosted-backend capability.
//!
//! The [`Backend`] trait abstracts everything the SDK needs from the
//! hosted service: session retrieval and refresh, sign-out, profile row
//! access, remote procedures, and a stream of auth-change events. The
//! production implementation is [`HttpBackend`]; tests substitute their
//! own.

mod error;
mod http;
pub mod jwt;

pub use error::BackendError;
pub use http::HttpBackend;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use mintvault_core::{Email, ProfilePreferences, ProfileSource, Session, UserId, UserProfile};

/// Auth-change events emitted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// A new session was established.
    SignedIn,
    /// The session was ended.
    SignedOut,
    /// The session's tokens were replaced.
    TokenRefreshed,
    /// The authenticated identity's data changed.
    UserUpdated,
}

/// One auth-change notification: the event plus the session it applies
/// to (absent for sign-out).
#[derive(Debug, Clone)]
pub struct AuthSignal {
    /// What happened.
    pub event: AuthEvent,
    /// The session after the event, if one exists.
    pub session: Option<Session>,
}

/// Wire shape of a row in the `profiles` table.
///
/// Every field beyond the ID is optional; rows created by older app
/// versions may lack the gamification or preference columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Row key (matches the identity's user ID).
    pub id: Option<UserId>,
    /// Email stored on the row, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    /// Public handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Collector bio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Avatar image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Collector level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// XP accumulated toward the next level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<u32>,
    /// XP required to reach the next level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp_to_next: Option<u32>,
    /// Characters the collector follows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_characters: Option<Vec<String>>,
    /// Collection focus tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_focus: Option<Vec<String>>,
    /// Lower bound of the price range of interest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    /// Upper bound of the price range of interest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
    /// Whether onboarding has been completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_complete: Option<bool>,
}

impl ProfileRow {
    /// Map this row onto a [`UserProfile`], filling gaps from the
    /// authenticated identity and the fallback defaults.
    #[must_use]
    pub fn into_profile(self, identity: &mintvault_core::UserIdentity) -> UserProfile {
        let fallback = UserProfile::fallback(identity);
        UserProfile {
            id: self.id.unwrap_or(identity.id),
            email: self.email.unwrap_or_else(|| identity.email.clone()),
            username: self.username.unwrap_or(fallback.username),
            full_name: self.full_name.or(fallback.full_name),
            bio: self.bio,
            avatar_url: self.avatar_url.or(fallback.avatar_url),
            level: self.level.unwrap_or(fallback.level),
            xp: self.xp.unwrap_or(0),
            xp_to_next: self.xp_to_next.unwrap_or(fallback.xp_to_next),
            preferences: ProfilePreferences {
                favorite_characters: self.favorite_characters.unwrap_or_default(),
                collection_focus: self.collection_focus.unwrap_or_default(),
                min_price: self.min_price,
                max_price: self.max_price,
            },
            onboarding_complete: self.onboarding_complete.unwrap_or(false),
            source: ProfileSource::Fetched,
        }
    }
}

/// Partial update applied to a profile row.
///
/// Absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    /// New public handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// New bio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// New avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Onboarding completion flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_complete: Option<bool>,
}

/// Operations the SDK requires from the hosted backend.
///
/// Implementations must be cheap to share (`Arc<dyn Backend>`); every
/// method is an await point and may be called from spawned tasks.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The session the backend currently holds for this client, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on transport failure.
    async fn current_session(&self) -> Result<Option<Session>, BackendError>;

    /// Exchange the held refresh token for a replacement session.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NoSession`] if no session is held, or a
    /// transport/API error if the grant is rejected.
    async fn refresh_session(&self) -> Result<Session, BackendError>;

    /// Best-effort remote sign-out.
    ///
    /// # Errors
    ///
    /// Implementations may report transport failures; callers log them
    /// and proceed - sign-out is never blocking.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Fetch the profile row for `user_id`, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on transport or decode failure.
    async fn fetch_profile_row(&self, user_id: UserId) -> Result<Option<ProfileRow>, BackendError>;

    /// Apply `patch` to the profile row for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Conflict`] on a unique-constraint
    /// violation (e.g., duplicate username).
    async fn update_profile_row(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> Result<ProfileRow, BackendError>;

    /// Invoke a remote procedure with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on transport failure or procedure
    /// rejection.
    async fn call_procedure(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, BackendError>;

    /// Subscribe to auth-change events.
    ///
    /// The stream is persistent for the life of the backend; receivers
    /// that fall behind observe a lag error and continue.
    fn events(&self) -> broadcast::Receiver<AuthSignal>;
}
