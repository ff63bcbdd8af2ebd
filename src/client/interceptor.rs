//! Request interceptor
//!
//! Runs immediately before every outgoing request: assigns a request id,
//! attaches the stored access token as a bearer credential, and decides
//! whether the loading observer should hear about the request.

use chrono::Utc;
use reqwest::Method;
use serde_json::Value;

/// Header carrying the request id to the backend.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Everything needed to (re)issue one logical request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Set once the request has been replayed after a token refresh.
    pub retried: bool,
    /// Whether the loading observer hears about this request. Cleared for
    /// the token refresh call.
    pub track_loading: bool,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            request_id: new_request_id(),
            method,
            path: path.into(),
            body,
            retried: false,
            track_loading: true,
        }
    }

    /// The same request, hidden from the loading observer.
    pub fn untracked(mut self) -> Self {
        self.track_loading = false;
        self
    }

    /// The same request, marked as retried, under a fresh request id.
    pub fn retry(&self) -> Self {
        Self {
            request_id: new_request_id(),
            retried: true,
            ..self.clone()
        }
    }
}

/// Returns `<epoch millis>-<random hex>`.
///
/// # Examples
///
/// ```
/// use fleetdesk::client::interceptor::new_request_id;
///
/// let a = new_request_id();
/// let b = new_request_id();
/// assert_ne!(a, b);
/// assert!(a.contains('-'));
/// ```
pub fn new_request_id() -> String {
    format!(
        "{}-{:08x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}

/// Joins a base URL and a request path with exactly one slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Builds the outgoing request for `ctx`.
///
/// The bearer token is attached whenever one is stored, even if it looks
/// expired; the server decides.
pub fn prepare(
    http: &reqwest::Client,
    base_url: &str,
    ctx: &RequestContext,
    access_token: Option<&str>,
) -> reqwest::RequestBuilder {
    let mut builder = http
        .request(ctx.method.clone(), join_url(base_url, &ctx.path))
        .header(REQUEST_ID_HEADER, &ctx.request_id)
        .header(reqwest::header::ACCEPT, "application/json");

    if let Some(token) = access_token {
        builder = builder.bearer_auth(token);
    }
    if let Some(ref body) = ctx.body {
        builder = builder.json(body);
    }
    builder
}
