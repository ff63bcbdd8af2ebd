//! Client-side JWT inspection
//!
//! Only the payload's `exp` claim is inspected; signatures are the
//! backend's business. Every function here treats malformed input as
//! "invalid" rather than an error.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Decoded JWT payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry as epoch seconds.
    #[serde(default)]
    pub exp: Option<i64>,

    /// Subject, usually the user id.
    #[serde(default)]
    pub sub: Option<Value>,

    /// Remaining claims.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Decodes the payload segment of a three-segment token.
///
/// Returns `None` when the token does not have exactly three non-empty
/// segments or when the payload is not base64url-encoded JSON.
///
/// # Examples
///
/// ```
/// use fleetdesk::session::jwt::decode_claims;
///
/// assert!(decode_claims("not-a-token").is_none());
/// ```
pub fn decode_claims(token: &str) -> Option<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Returns the token's expiry instant, if it carries a usable `exp` claim.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let exp = decode_claims(token)?.exp?;
    DateTime::from_timestamp(exp, 0)
}

/// Returns `true` when the token is structurally sound and not yet expired.
///
/// # Examples
///
/// ```
/// use fleetdesk::session::jwt::is_valid;
///
/// assert!(!is_valid(""));
/// assert!(!is_valid("a.b"));
/// assert!(!is_valid("a.%%%.c"));
/// ```
pub fn is_valid(token: &str) -> bool {
    match decode_claims(token).and_then(|claims| claims.exp) {
        Some(exp) => exp > Utc::now().timestamp(),
        None => false,
    }
}

#[cfg(test)]
pub(crate) fn encode_for_test(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}
