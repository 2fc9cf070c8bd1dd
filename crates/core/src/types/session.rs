//! Authentication session and identity types.
//!
//! A [`Session`] is one credential grant issued by the hosted backend: an
//! access/refresh token pair plus an absolute expiry. Sessions are replaced
//! wholesale on every refresh - never mutated in place - and dropped on
//! sign-out or terminal expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::email::Email;
use crate::types::id::UserId;

/// One authenticated credential grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for authenticated calls.
    pub access_token: String,
    /// Token used to obtain a replacement session.
    pub refresh_token: String,
    /// Absolute expiry as Unix epoch seconds.
    pub expires_at: i64,
    /// Unix epoch seconds at which this grant was issued to the client.
    pub obtained_at: i64,
    /// The identity this grant authenticates.
    pub user: UserIdentity,
}

impl Session {
    /// Seconds remaining until expiry at `now` (negative once past).
    #[must_use]
    pub const fn expires_in(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    /// Whether the grant has passed its expiry at `now`.
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// The expiry as a UTC timestamp, if representable.
    #[must_use]
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }
}

/// The raw identity the backend authenticates, before any profile row is
/// layered on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Backend-issued user ID.
    pub id: UserId,
    /// Email address the identity signed up with.
    pub email: Email,
    /// Free-form metadata captured at sign-up (display name, avatar, ...).
    #[serde(default)]
    pub metadata: IdentityMetadata,
}

/// Sign-up metadata attached to an identity.
///
/// All fields are optional; OAuth providers populate different subsets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityMetadata {
    /// Preferred username chosen at sign-up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Display name from the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Avatar URL from the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            obtained_at: 0,
            user: UserIdentity {
                id: UserId::new(Uuid::nil()),
                email: Email::parse("collector@example.com").unwrap(),
                metadata: IdentityMetadata::default(),
            },
        }
    }

    #[test]
    fn test_expires_in() {
        let s = session(1_000);
        assert_eq!(s.expires_in(400), 600);
        assert_eq!(s.expires_in(1_500), -500);
    }

    #[test]
    fn test_is_expired_at_boundary() {
        let s = session(1_000);
        assert!(!s.is_expired(999));
        assert!(s.is_expired(1_000));
        assert!(s.is_expired(1_001));
    }

    #[test]
    fn test_metadata_defaults_when_absent() {
        let json = r#"{
            "access_token": "a",
            "refresh_token": "r",
            "expires_at": 10,
            "obtained_at": 0,
            "user": {
                "id": "00000000-0000-0000-0000-000000000000",
                "email": "x@y.z"
            }
        }"#;
        let s: Session = serde_json::from_str(json).unwrap();
        assert!(s.user.metadata.username.is_none());
    }
}
