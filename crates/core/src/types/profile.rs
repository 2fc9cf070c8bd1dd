//! Application-level user profile.
//!
//! A [`UserProfile`] is the marketplace's user record layered over the raw
//! authenticated identity: username, bio, collector gamification fields,
//! and preferences. When the backend profile row is unavailable, a
//! fallback profile is synthesized from the identity so that consumers
//! never observe a missing profile while signed in.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::email::Email;
use crate::types::id::UserId;
use crate::types::session::UserIdentity;

/// Default level for a freshly synthesized profile.
const FALLBACK_LEVEL: u32 = 1;
/// Default XP required to reach the next level.
const FALLBACK_XP_TO_NEXT: u32 = 1_000;
/// Username used when neither metadata nor email yields one.
const FALLBACK_USERNAME: &str = "user";

/// Where a profile's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    /// Loaded from the backend profile row.
    #[default]
    Fetched,
    /// Synthesized locally because the row was missing or unreadable.
    Fallback,
}

/// The marketplace user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend-issued user ID (same as the identity's).
    pub id: UserId,
    /// Account email address.
    pub email: Email,
    /// Public handle shown on bids and listings.
    pub username: String,
    /// Display name, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Collector bio, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Avatar image URL, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Collector level.
    pub level: u32,
    /// XP accumulated toward the next level.
    pub xp: u32,
    /// XP required to reach the next level.
    pub xp_to_next: u32,
    /// Collecting preferences.
    #[serde(default)]
    pub preferences: ProfilePreferences,
    /// Whether the onboarding flow has been completed.
    #[serde(default)]
    pub onboarding_complete: bool,
    /// Whether this profile was fetched or synthesized.
    #[serde(default)]
    pub source: ProfileSource,
}

impl UserProfile {
    /// Synthesize a fallback profile from a raw identity.
    ///
    /// Used when the backend profile row is missing or the fetch failed;
    /// the username is taken from the sign-up metadata, then the email
    /// local part, then a literal placeholder.
    #[must_use]
    pub fn fallback(identity: &UserIdentity) -> Self {
        let username = identity
            .metadata
            .username
            .clone()
            .or_else(|| {
                let local = identity.email.local_part();
                (!local.is_empty()).then(|| local.to_string())
            })
            .unwrap_or_else(|| FALLBACK_USERNAME.to_string());

        Self {
            id: identity.id,
            email: identity.email.clone(),
            username,
            full_name: identity.metadata.full_name.clone(),
            bio: None,
            avatar_url: identity.metadata.avatar_url.clone(),
            level: FALLBACK_LEVEL,
            xp: 0,
            xp_to_next: FALLBACK_XP_TO_NEXT,
            preferences: ProfilePreferences::default(),
            onboarding_complete: false,
            source: ProfileSource::Fallback,
        }
    }

    /// Whether this profile was synthesized rather than fetched.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self.source, ProfileSource::Fallback)
    }
}

/// Collecting preferences attached to a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePreferences {
    /// Characters the collector follows for new listings.
    #[serde(default)]
    pub favorite_characters: Vec<String>,
    /// Tags describing what the collection focuses on.
    #[serde(default)]
    pub collection_focus: Vec<String>,
    /// Lower bound of the price range of interest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    /// Upper bound of the price range of interest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use crate::types::session::IdentityMetadata;

    use super::*;

    fn identity(email: &str, username: Option<&str>) -> UserIdentity {
        UserIdentity {
            id: UserId::new(Uuid::new_v4()),
            email: Email::parse(email).unwrap(),
            metadata: IdentityMetadata {
                username: username.map(String::from),
                full_name: None,
                avatar_url: None,
            },
        }
    }

    #[test]
    fn test_fallback_defaults() {
        let profile = UserProfile::fallback(&identity("vault@example.com", None));
        assert_eq!(profile.level, 1);
        assert_eq!(profile.xp, 0);
        assert_eq!(profile.xp_to_next, 1_000);
        assert!(profile.is_fallback());
        assert!(profile.preferences.favorite_characters.is_empty());
    }

    #[test]
    fn test_fallback_username_prefers_metadata() {
        let profile = UserProfile::fallback(&identity("vault@example.com", Some("popking")));
        assert_eq!(profile.username, "popking");
    }

    #[test]
    fn test_fallback_username_from_email_local_part() {
        let profile = UserProfile::fallback(&identity("vault@example.com", None));
        assert_eq!(profile.username, "vault");
    }

    #[test]
    fn test_fetched_is_default_source() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000000",
            "email": "a@b.c",
            "username": "a",
            "level": 3,
            "xp": 120,
            "xp_to_next": 1000
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.source, ProfileSource::Fetched);
        assert!(!profile.is_fallback());
    }
}
