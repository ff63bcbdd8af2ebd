//! Session credential issued by the console backend
//!
//! The login and refresh endpoints answer with a camelCase payload that is
//! either flat or wrapped in a `{ "success": true, "data": { ... } }`
//! envelope. [`SessionCredential::from_response`] accepts both shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// CredentialKey
// ---------------------------------------------------------------------------

/// The fixed set of keys persisted by the token store.
///
/// The string forms match the keys the web console has always used, so a
/// file-backed scope written by one client can be read by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    User,
    ExpiresIn,
}

impl CredentialKey {
    /// Every key, in the order they are written.
    pub const ALL: [CredentialKey; 4] = [
        CredentialKey::AccessToken,
        CredentialKey::RefreshToken,
        CredentialKey::User,
        CredentialKey::ExpiresIn,
    ];

    /// Returns the persistence key name.
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialKey::AccessToken => "access_token",
            CredentialKey::RefreshToken => "refresh_token",
            CredentialKey::User => "user",
            CredentialKey::ExpiresIn => "token_expires_in",
        }
    }
}

impl std::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SessionCredential
// ---------------------------------------------------------------------------

/// Access/refresh token pair plus the signed-in user record.
///
/// # Examples
///
/// ```
/// use fleetdesk::session::SessionCredential;
/// use serde_json::json;
///
/// let body = json!({
///     "success": true,
///     "data": { "accessToken": "a.b.c", "refreshToken": "r", "expiresIn": 900 }
/// });
/// let credential = SessionCredential::from_response(&body).unwrap();
/// assert_eq!(credential.access_token, "a.b.c");
/// assert_eq!(credential.expires_in, Some(900));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredential {
    /// Short-lived JWT sent as the bearer credential.
    pub access_token: String,

    /// Longer-lived token exchanged for a new access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Opaque user record returned by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,

    /// Access token lifetime in seconds, as reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl SessionCredential {
    /// Creates a credential holding only an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            user: None,
            expires_in: None,
        }
    }

    /// Sets the refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the user record.
    pub fn with_user(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }

    /// Sets the access token lifetime.
    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Extracts a credential from a login or refresh response body.
    ///
    /// Looks inside a `data` object first, then at the top level. Returns
    /// `None` when no non-empty `accessToken` is present.
    pub fn from_response(body: &Value) -> Option<Self> {
        let payload = match body.get("data") {
            Some(data) if data.get("accessToken").is_some() => data,
            _ => body,
        };

        let credential: SessionCredential = serde_json::from_value(payload.clone()).ok()?;
        if credential.access_token.is_empty() {
            return None;
        }
        Some(credential)
    }
}
