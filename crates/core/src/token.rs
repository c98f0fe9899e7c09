//! Bearer token payload inspection
//!
//! Access tokens are compact three-segment credentials. Only the middle
//! segment is read here, for the `exp` claim; signature verification is
//! the backend's job.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
}

/// Decode the `exp` claim (seconds since epoch) from a bearer token.
///
/// Returns `None` when the token has no payload segment, the segment is
/// not base64url JSON, or the claim is missing.
pub fn decode_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: TokenClaims = serde_json::from_slice(&bytes).ok()?;
    claims.exp
}

/// Expiry check for a credential.
///
/// Absent and undecodable tokens count as expired; `exp` is compared
/// against `now_millis` in milliseconds.
pub fn is_expired(token: Option<&str>, now_millis: i64) -> bool {
    match token.and_then(decode_expiry) {
        Some(exp) => exp * 1000 < now_millis,
        None => true,
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn decodes_exp_claim() {
        let token = token_with_payload(r#"{"exp":1700000000,"sub":"42"}"#);
        assert_eq!(decode_expiry(&token), Some(1_700_000_000));
    }

    #[test]
    fn missing_exp_claim_is_none() {
        let token = token_with_payload(r#"{"sub":"42"}"#);
        assert_eq!(decode_expiry(&token), None);
    }

    #[test]
    fn garbage_token_is_none() {
        assert_eq!(decode_expiry("not-a-token"), None);
        assert_eq!(decode_expiry("a.%%%%.c"), None);
        assert_eq!(decode_expiry(""), None);
    }

    #[test]
    fn past_exp_is_expired() {
        let token = token_with_payload(r#"{"exp":1000}"#);
        assert!(is_expired(Some(token.as_str()), 1_001_000));
    }

    #[test]
    fn future_exp_is_fresh() {
        let token = token_with_payload(r#"{"exp":2000}"#);
        assert!(!is_expired(Some(token.as_str()), 1_999_000));
    }

    #[test]
    fn boundary_exp_is_fresh() {
        let token = token_with_payload(r#"{"exp":2000}"#);
        assert!(!is_expired(Some(token.as_str()), 2_000_000));
    }

    #[test]
    fn absent_token_is_expired() {
        assert!(is_expired(None, 0));
    }

    #[test]
    fn undecodable_token_is_expired() {
        assert!(is_expired(Some("junk"), 0));
    }

    #[test]
    fn token_without_exp_is_expired() {
        let token = token_with_payload(r#"{"sub":"42"}"#);
        assert!(is_expired(Some(token.as_str()), 0));
    }
}
