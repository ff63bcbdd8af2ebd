//! Normalized API errors
//!
//! Every failure the client surfaces has the same serialized shape:
//!
//! ```json
//! { "success": false, "message": "...", "statusCode": 403, "error": "Forbidden" }
//! ```
//!
//! with optional `data` (the server's error body) and `retryAfter`
//! (seconds, rate-limited responses only).

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Result type for client operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Fallback rate-limit wait when the server gives no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action.";
const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Category of a normalized error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 401 from a public route (wrong username or password).
    InvalidCredentials,
    /// 401 on a request that was already retried with a refreshed token.
    Unauthorized,
    /// No refresh token, or the refresh itself failed.
    SessionExpired,
    /// 403.
    Forbidden,
    /// 429.
    RateLimited,
    /// The request timed out before a response arrived.
    Timeout,
    /// No response was received at all.
    Network,
    /// Any other server-returned error.
    Server,
    /// A successful status whose body could not be decoded.
    Decode,
}

impl ApiErrorKind {
    /// Label used in the `error` field.
    pub fn label(self) -> &'static str {
        match self {
            ApiErrorKind::InvalidCredentials => "InvalidCredentials",
            ApiErrorKind::Unauthorized => "Unauthorized",
            ApiErrorKind::SessionExpired => "SessionExpired",
            ApiErrorKind::Forbidden => "Forbidden",
            ApiErrorKind::RateLimited => "TooManyRequests",
            ApiErrorKind::Timeout => "Timeout",
            ApiErrorKind::Network => "NetworkError",
            ApiErrorKind::Server => "ServerError",
            ApiErrorKind::Decode => "DecodeError",
        }
    }
}

/// A failure in the uniform `{ success: false, ... }` shape.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{message} (status {status_code})")]
pub struct ApiError {
    #[serde(serialize_with = "always_false")]
    success: (),
    pub message: String,
    pub status_code: u16,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip)]
    kind: ApiErrorKind,
}

fn always_false<S: Serializer>(_: &(), serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_bool(false)
}

impl ApiError {
    fn new(kind: ApiErrorKind, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            success: (),
            message: message.into(),
            status_code,
            error: kind.label().to_string(),
            data: None,
            retry_after: None,
            kind,
        }
    }

    fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data.filter(|v| !v.is_null());
        self
    }

    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    /// Credentials rejected by a public route.
    pub fn invalid_credentials(body: Option<Value>) -> Self {
        let message = server_message(body.as_ref())
            .unwrap_or_else(|| "Invalid email or password.".to_string());
        Self::new(ApiErrorKind::InvalidCredentials, 401, message).with_data(body)
    }

    /// A retried request was rejected again.
    pub fn unauthorized(body: Option<Value>) -> Self {
        let message =
            server_message(body.as_ref()).unwrap_or_else(|| "Authentication required.".to_string());
        Self::new(ApiErrorKind::Unauthorized, 401, message).with_data(body)
    }

    /// The session cannot be renewed.
    pub fn session_expired() -> Self {
        Self::new(ApiErrorKind::SessionExpired, 401, SESSION_EXPIRED_MESSAGE)
    }

    pub fn forbidden(body: Option<Value>) -> Self {
        Self::new(ApiErrorKind::Forbidden, 403, FORBIDDEN_MESSAGE).with_data(body)
    }

    pub fn rate_limited(retry_after: u64, body: Option<Value>) -> Self {
        let mut error = Self::new(
            ApiErrorKind::RateLimited,
            429,
            format!("Too many requests. Please try again in {retry_after} seconds."),
        )
        .with_data(body);
        error.retry_after = Some(retry_after);
        error
    }

    pub fn timeout() -> Self {
        Self::new(
            ApiErrorKind::Timeout,
            408,
            "The request timed out. Please try again.",
        )
    }

    pub fn network(detail: impl std::fmt::Display) -> Self {
        tracing::debug!(%detail, "No response received");
        Self::new(
            ApiErrorKind::Network,
            0,
            "Unable to reach the server. Check your connection.",
        )
    }

    /// Server error passthrough: `message` and `error` come from the body
    /// when it provides them.
    pub fn server(status: u16, body: Option<Value>) -> Self {
        let message = server_message(body.as_ref())
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        let mut error = Self::new(ApiErrorKind::Server, status, message);
        if let Some(label) = body
            .as_ref()
            .and_then(|b| b.get("error"))
            .and_then(Value::as_str)
        {
            error.error = label.to_string();
        }
        error.with_data(body)
    }

    pub fn decode(status: u16, detail: impl std::fmt::Display) -> Self {
        Self::new(
            ApiErrorKind::Decode,
            status,
            format!("Unreadable response body: {detail}"),
        )
    }

    /// Normalizes a non-success response that is not a 401.
    pub fn from_status(status: u16, headers: &HeaderMap, body: Option<Value>) -> Self {
        match status {
            403 => Self::forbidden(body),
            429 => Self::rate_limited(retry_after_secs(headers, Utc::now()), body),
            // A server-reported 408 or 504 is a response; `Timeout` is kept
            // for requests that never got one.
            _ => Self::server(status, body),
        }
    }

    /// Normalizes a transport failure where no response arrived.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout()
        } else {
            Self::network(err)
        }
    }
}

fn server_message(body: Option<&Value>) -> Option<String> {
    body?
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Reads `Retry-After` as delta-seconds or an HTTP date.
pub fn retry_after_secs(headers: &HeaderMap, now: DateTime<Utc>) -> u64 {
    let Some(raw) = headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok()) else {
        return DEFAULT_RETRY_AFTER_SECS;
    };
    let raw = raw.trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return secs;
    }
    match DateTime::parse_from_rfc2822(raw) {
        Ok(at) => (at.with_timezone(&Utc) - now).num_seconds().max(0) as u64,
        Err(_) => DEFAULT_RETRY_AFTER_SECS,
    }
}
