//! Authenticated REST client for the console backend
//!
//! [`ApiClient`] wraps a `reqwest` client with two interceptors:
//!
//! - the request side ([`interceptor`]) attaches the stored bearer token and
//!   a request id, and reports the request to the [`LoadingObserver`];
//! - the response side normalizes failures into [`ApiError`] and, on a
//!   `401`, refreshes the access token once per failure episode and replays
//!   every request that hit the failure ([`refresh`]).
//!
//! # Module Layout
//!
//! - [`error`]       -- normalized error shape
//! - [`hooks`]       -- loading observer and navigator collaborators
//! - [`interceptor`] -- request preparation
//! - [`refresh`]     -- refresh coalescing state machine
//! - [`routes`]      -- public route and redirect helpers
//!
//! # Examples
//!
//! ```no_run
//! use fleetdesk::client::{ApiClient, ClientSettings, LoginCredentials};
//! use fleetdesk::session::TokenStore;
//!
//! # async fn example() -> fleetdesk::error::Result<()> {
//! let client = ApiClient::new(ClientSettings::default(), TokenStore::in_memory())?;
//! client
//!     .login(&LoginCredentials::new("ops@example.com", "secret"), true)
//!     .await?;
//! let drivers = client.get("/drivers").await?;
//! println!("{}", drivers.data);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hooks;
pub mod interceptor;
pub mod refresh;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{FleetdeskError, Result};
use crate::session::{jwt, SessionCredential, TokenStore};

pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use hooks::{LoadingObserver, Navigator, NoopLoadingObserver, NoopNavigator};
pub use interceptor::RequestContext;
pub use refresh::{RefreshCoordinator, RefreshTicket};

use refresh::RefreshGuard;

// ---------------------------------------------------------------------------
// Settings and payloads
// ---------------------------------------------------------------------------

/// Endpoint layout and timeouts used by [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub login_path: String,
    pub refresh_path: String,
    pub public_routes: Vec<String>,
    /// Path of the login view used for forced redirects.
    pub login_view: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout: Duration::from_secs(30),
            login_path: "/auth/login".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            public_routes: routes::DEFAULT_PUBLIC_ROUTES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            login_view: "/login".to_string(),
        }
    }
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            timeout: Duration::from_secs(config.api.timeout_seconds),
            login_path: config.api.login_path.clone(),
            refresh_path: config.api.refresh_path.clone(),
            public_routes: config.api.public_routes.clone(),
            login_view: config.navigation.login_view.clone(),
        }
    }
}

/// Body of the login request.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A successful response.
///
/// `data` is the decoded JSON body, `Value::Null` for an empty body, or a
/// JSON string for a non-JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
    pub request_id: String,
}

impl ApiResponse {
    /// Decodes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| ApiError::decode(self.status, e))
    }
}

/// Result of one network round trip, before 401 handling.
enum Outcome {
    Success(ApiResponse),
    Unauthorized(Option<Value>),
    Failed(ApiError),
}

/// Fires `request_finished` when dropped, so cancelled requests release
/// their loading state too.
struct LoadingGuard<'a> {
    observer: &'a dyn LoadingObserver,
    request_id: &'a str,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.observer.request_finished(self.request_id);
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// REST client with bearer authentication and coalesced token refresh.
///
/// Cloning is cheap; clones share the token store, the refresh state, and
/// the collaborators.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    settings: Arc<ClientSettings>,
    store: TokenStore,
    refresh: RefreshCoordinator,
    loading: Arc<dyn LoadingObserver>,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("settings", &self.settings)
            .field("store", &self.store)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client with no-op collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`FleetdeskError::Http`] if the underlying HTTP client cannot
    /// be constructed (TLS backend initialisation failure).
    pub fn new(settings: ClientSettings, store: TokenStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(FleetdeskError::Http)?;

        Ok(Self {
            http,
            settings: Arc::new(settings),
            store,
            refresh: RefreshCoordinator::new(),
            loading: Arc::new(NoopLoadingObserver),
            navigator: Arc::new(NoopNavigator),
        })
    }

    pub fn with_loading_observer(mut self, observer: Arc<dyn LoadingObserver>) -> Self {
        self.loading = observer;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Uses an externally owned refresh state, e.g. one shared with another
    /// client over the same token store.
    pub fn with_refresh_coordinator(mut self, coordinator: RefreshCoordinator) -> Self {
        self.refresh = coordinator;
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Session entry points
    // -----------------------------------------------------------------------

    /// Exchanges credentials for a session and persists it.
    ///
    /// `remember` selects the remembered scope; otherwise the session lives
    /// in the ephemeral scope only.
    ///
    /// # Errors
    ///
    /// Returns [`FleetdeskError::Api`] with
    /// [`ApiErrorKind::InvalidCredentials`] when the backend rejects the
    /// credentials, or a storage error if the session cannot be written.
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
        remember: bool,
    ) -> Result<SessionCredential> {
        let body = serde_json::to_value(credentials)?;
        let ctx = RequestContext::new(Method::POST, self.settings.login_path.clone(), Some(body));
        let response = self.execute(ctx, None).await.map_err(FleetdeskError::Api)?;

        let credential = SessionCredential::from_response(&response.data).ok_or_else(|| {
            FleetdeskError::Api(ApiError::decode(
                response.status,
                "login response carries no access token",
            ))
        })?;

        self.store.write(&credential, remember)?;
        tracing::info!(email = %credentials.email, remember, "Logged in");
        Ok(credential)
    }

    /// Ends the session: clears the token store and navigates to the login
    /// view.
    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        self.navigator.navigate(&self.settings.login_view);
        tracing::info!("Logged out");
        Ok(())
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// Joins an in-flight refresh if there is one. On failure the session is
    /// ended and the user is redirected to the login view.
    pub async fn refresh(&self) -> ApiResult<String> {
        match self.refresh.begin() {
            RefreshTicket::Leader(guard) => self.lead_refresh(guard).await,
            RefreshTicket::Waiter(rx) => rx.await.unwrap_or_else(|_| Err(ApiError::session_expired())),
            RefreshTicket::Settled => self.settled_token(),
        }
    }

    /// `true` when a structurally valid, unexpired access token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.stored_access_token()
            .map(|token| jwt::is_valid(&token))
            .unwrap_or(false)
    }

    /// The stored user record.
    pub fn current_user(&self) -> Result<Option<Value>> {
        self.store.user()
    }

    // -----------------------------------------------------------------------
    // Authenticated requests
    // -----------------------------------------------------------------------

    /// Issues an authenticated request.
    ///
    /// A `401` on a protected route triggers at most one token refresh per
    /// failure episode; the request is then replayed once with the new
    /// token.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<ApiResponse> {
        self.execute(RequestContext::new(method, path, body), None)
            .await
    }

    pub async fn get(&self, path: &str) -> ApiResult<ApiResponse> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> ApiResult<ApiResponse> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> ApiResult<ApiResponse> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> ApiResult<ApiResponse> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<ApiResponse> {
        self.request(Method::DELETE, path, None).await
    }

    /// GETs `path` and decodes the body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.get(path).await?.json()
    }

    // -----------------------------------------------------------------------
    // Response interceptor
    // -----------------------------------------------------------------------

    /// Sends `ctx` with `token`, or with the stored token when `None`.
    fn execute(
        &self,
        ctx: RequestContext,
        token: Option<String>,
    ) -> BoxFuture<'_, ApiResult<ApiResponse>> {
        async move {
            // Read the generation before the token so a settle in between
            // is seen as one that happened after sending.
            let generation = self.refresh.generation();
            let token = token.or_else(|| self.stored_access_token());
            match self.dispatch(&ctx, token.as_deref()).await {
                Outcome::Success(response) => Ok(response),
                Outcome::Failed(error) => Err(error),
                Outcome::Unauthorized(body) => {
                    self.handle_unauthorized(ctx, token, generation, body)
                        .await
                }
            }
        }
        .boxed()
    }

    async fn handle_unauthorized(
        &self,
        ctx: RequestContext,
        sent_token: Option<String>,
        generation: u64,
        body: Option<Value>,
    ) -> ApiResult<ApiResponse> {
        // The login endpoint is public even when absent from the list.
        if routes::is_public_route(&ctx.path, &self.settings.public_routes)
            || routes::is_same_route(&ctx.path, &self.settings.login_path)
        {
            return Err(ApiError::invalid_credentials(body));
        }
        if ctx.retried {
            tracing::debug!(path = %ctx.path, "Retried request rejected again");
            return Err(ApiError::unauthorized(body));
        }

        // Another request already refreshed while this one was in flight.
        if let Some(current) = self.stored_access_token() {
            if sent_token.as_deref() != Some(current.as_str()) && !self.refresh.is_refreshing() {
                tracing::debug!(path = %ctx.path, "Replaying with already refreshed token");
                return self.execute(ctx.retry(), Some(current)).await;
            }
        }

        match self.refresh.begin_after(generation) {
            RefreshTicket::Leader(guard) => {
                let token = self.lead_refresh(guard).await?;
                self.execute(ctx.retry(), Some(token)).await
            }
            RefreshTicket::Waiter(rx) => match rx.await {
                Ok(Ok(token)) => self.execute(ctx.retry(), Some(token)).await,
                Ok(Err(error)) => Err(error),
                Err(_) => Err(ApiError::session_expired()),
            },
            RefreshTicket::Settled => {
                let token = self.settled_token()?;
                self.execute(ctx.retry(), Some(token)).await
            }
        }
    }

    /// Performs the refresh as leader and settles every waiter.
    async fn lead_refresh(&self, guard: RefreshGuard) -> ApiResult<String> {
        match self.exchange_refresh_token().await {
            Ok(token) => {
                tracing::info!("Access token refreshed");
                guard.settle(Ok(token.clone()));
                Ok(token)
            }
            Err(error) => {
                if let Err(e) = self.store.clear() {
                    tracing::warn!("Failed to clear token store after refresh failure: {}", e);
                }
                guard.settle(Err(error.clone()));
                self.redirect_to_login();
                Err(error)
            }
        }
    }

    async fn exchange_refresh_token(&self) -> ApiResult<String> {
        let refresh_token = match self.store.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::warn!("Session expired and no refresh token is stored");
                return Err(ApiError::session_expired());
            }
            Err(e) => {
                tracing::warn!("Failed to read refresh token: {}", e);
                return Err(ApiError::session_expired());
            }
        };

        let ctx = RequestContext::new(
            Method::POST,
            self.settings.refresh_path.clone(),
            Some(json!({ "refreshToken": refresh_token })),
        )
        .untracked();
        let sent = self.stored_access_token();

        let response = match self.dispatch(&ctx, sent.as_deref()).await {
            Outcome::Success(response) => response,
            Outcome::Unauthorized(_) => {
                tracing::warn!("Refresh token rejected by the server");
                return Err(ApiError::session_expired());
            }
            Outcome::Failed(error) => {
                tracing::warn!(kind = ?error.kind(), "Token refresh failed: {}", error);
                return Err(ApiError::session_expired());
            }
        };

        let Some(credential) = SessionCredential::from_response(&response.data) else {
            tracing::warn!("Refresh response carries no access token");
            return Err(ApiError::session_expired());
        };

        if let Err(e) = self
            .store
            .update_access_token(&credential.access_token, credential.refresh_token.as_deref())
        {
            tracing::warn!("Failed to persist refreshed access token: {}", e);
            return Err(ApiError::session_expired());
        }
        Ok(credential.access_token)
    }

    /// The token left behind by an episode that already settled. A failed
    /// episode cleared the store.
    fn settled_token(&self) -> ApiResult<String> {
        self.stored_access_token()
            .ok_or_else(ApiError::session_expired)
    }

    fn redirect_to_login(&self) {
        let current = self.navigator.current_path();
        if let Some(target) = routes::login_redirect_target(&self.settings.login_view, &current) {
            tracing::warn!(%target, "Session ended; redirecting to login");
            self.navigator.navigate(&target);
        }
    }

    fn stored_access_token(&self) -> Option<String> {
        match self.store.access_token() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Failed to read access token: {}", e);
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    async fn dispatch(&self, ctx: &RequestContext, token: Option<&str>) -> Outcome {
        let _loading = if ctx.track_loading {
            self.loading.request_started(&ctx.request_id);
            Some(LoadingGuard {
                observer: self.loading.as_ref(),
                request_id: &ctx.request_id,
            })
        } else {
            None
        };

        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            retried = ctx.retried,
            "Dispatching request"
        );

        let response = match interceptor::prepare(&self.http, &self.settings.base_url, ctx, token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Outcome::Failed(ApiError::from_transport(&e)),
        };

        let status = response.status();
        let headers = response.headers().clone();
        let is_json = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Outcome::Failed(ApiError::from_transport(&e)),
        };
        let body = decode_body(&bytes);

        if status.is_success() {
            return match body {
                Ok(data) => Outcome::Success(ApiResponse {
                    status: status.as_u16(),
                    data,
                    request_id: ctx.request_id.clone(),
                }),
                Err(e) if is_json => Outcome::Failed(ApiError::decode(status.as_u16(), e)),
                Err(_) => Outcome::Success(ApiResponse {
                    status: status.as_u16(),
                    data: Value::String(String::from_utf8_lossy(&bytes).into_owned()),
                    request_id: ctx.request_id.clone(),
                }),
            };
        }

        let body = body.ok().filter(|v| !v.is_null());
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Outcome::Unauthorized(body);
        }
        Outcome::Failed(ApiError::from_status(status.as_u16(), &headers, body))
    }
}

fn decode_body(bytes: &[u8]) -> std::result::Result<Value, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_credentials_debug_redacts_password() {
        let creds = LoginCredentials::new("ops@example.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("ops@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_decode_body_empty_is_null() {
        assert_eq!(decode_body(b"").unwrap(), Value::Null);
        assert_eq!(decode_body(b"  \n").unwrap(), Value::Null);
        assert!(decode_body(b"<html>").is_err());
    }

    #[test]
    fn test_api_response_json_decode() {
        #[derive(serde::Deserialize)]
        struct Driver {
            id: u32,
        }
        let response = ApiResponse {
            status: 200,
            data: json!({ "id": 4 }),
            request_id: "r".to_string(),
        };
        let driver: Driver = response.json().unwrap();
        assert_eq!(driver.id, 4);

        let err = response.json::<Vec<u32>>().unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::Decode);
    }

    #[test]
    fn test_settings_from_default_config() {
        let settings = ClientSettings::from_config(&Config::default());
        assert_eq!(settings.refresh_path, "/auth/refresh");
        assert_eq!(settings.login_view, "/login");
        assert!(settings
            .public_routes
            .iter()
            .any(|r| r == "/auth/forgot-password"));
    }

    #[tokio::test]
    async fn test_new_client_starts_idle_and_unauthenticated() {
        let client = ApiClient::new(ClientSettings::default(), TokenStore::in_memory()).unwrap();
        assert!(!client.refresh.is_refreshing());
        assert!(!client.is_authenticated());
        assert!(client.current_user().unwrap().is_none());
    }
}
