//! Minimal JWT payload inspection.
//!
//! Access tokens issued by the backend are JWTs. Nothing here verifies
//! signatures - the backend does that - but a restored or handed-in token
//! sometimes arrives without its sidecar expiry, and the `exp` claim is
//! authoritative for scheduling purposes.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

/// Claims the SDK cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    /// Subject (the user ID).
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry as Unix epoch seconds.
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decode the payload segment of a JWT without verifying it.
///
/// Returns `None` if the token is not a three-segment JWT or the payload
/// is not valid base64url JSON.
#[must_use]
pub fn peek_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_jwt(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn test_peek_exp_and_sub() {
        let token = encode_jwt(&serde_json::json!({
            "sub": "4c9d6f2e-0000-0000-0000-000000000000",
            "exp": 1_900_000_000_i64,
        }));
        let claims = peek_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert_eq!(
            claims.sub.as_deref(),
            Some("4c9d6f2e-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn test_peek_tolerates_missing_claims() {
        let token = encode_jwt(&serde_json::json!({ "role": "authenticated" }));
        let claims = peek_claims(&token).unwrap();
        assert!(claims.exp.is_none());
        assert!(claims.sub.is_none());
    }

    #[test]
    fn test_peek_rejects_garbage() {
        assert!(peek_claims("not-a-jwt").is_none());
        assert!(peek_claims("a.%%%.c").is_none());
    }
}
