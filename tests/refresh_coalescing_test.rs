//! Token refresh integration tests
//!
//! Drives `ApiClient` against a `wiremock` backend that rejects the old
//! access token with `401` and accepts the refreshed one. The refresh
//! endpoint is delayed so concurrent requests pile up behind it.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    client_with, expired_jwt, store_with_session, valid_jwt, CountingObserver, RecordingNavigator,
};
use fleetdesk::client::{
    ApiClient, ApiErrorKind, ClientSettings, LoginCredentials, RefreshCoordinator,
};
use fleetdesk::session::{CredentialKey, CredentialScope, MemoryScope, ScopeKind, TokenStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// `GET /drivers` answers 401 for `old` and 200 for `new`.
async fn mount_drivers(server: &MockServer, old: &str, new: &str, calls_each: u64) {
    Mock::given(method("GET"))
        .and(path("/drivers"))
        .and(header("Authorization", bearer(old).as_str()))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })),
        )
        .expect(calls_each)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drivers"))
        .and(header("Authorization", bearer(new).as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "items": [{ "id": 1 }] })),
        )
        .expect(calls_each)
        .mount(server)
        .await;
}

/// Scope wrapper counting removals of the access token key.
#[derive(Debug, Default)]
struct CountingScope {
    inner: MemoryScope,
    access_removals: AtomicUsize,
}

impl CredentialScope for CountingScope {
    fn get(&self, key: CredentialKey) -> fleetdesk::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: CredentialKey, value: &str) -> fleetdesk::Result<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: CredentialKey) -> fleetdesk::Result<()> {
        if key == CredentialKey::AccessToken {
            self.access_removals.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.remove(key)
    }
}

// ---------------------------------------------------------------------------
// Coalescing
// ---------------------------------------------------------------------------

/// Concurrent 401s produce exactly one refresh call, and every request is
/// replayed with the refreshed token.
#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    let old = expired_jwt("old");
    let new = valid_jwt("new");
    const N: u64 = 5;

    mount_drivers(&server, &old, &new, N).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "data": { "accessToken": new } }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_session(&old, Some("refresh-1"), true);
    let navigator = RecordingNavigator::at("/drivers");
    let observer = CountingObserver::new();
    let client = client_with(&server.uri(), store, navigator.clone(), observer.clone());

    let results = join_all((0..N).map(|_| client.get("/drivers"))).await;

    for result in &results {
        let response = result.as_ref().expect("request should succeed after refresh");
        assert_eq!(response.status, 200);
        assert_eq!(response.data, json!({ "items": [{ "id": 1 }] }));
    }
    assert_eq!(client.store().access_token().unwrap(), Some(new.clone()));
    assert_eq!(client.store().active_scope().unwrap(), Some(ScopeKind::Remembered));
    assert!(navigator.visits().is_empty());

    // Each request was dispatched twice; the refresh call is not tracked.
    assert_eq!(observer.started(), (2 * N) as usize);
    assert_eq!(observer.finished(), observer.started());
    assert_eq!(observer.in_flight(), 0);
}

/// A failed refresh rejects every queued request, clears the store once,
/// and redirects to the login view once.
#[tokio::test]
async fn test_failed_refresh_rejects_all_and_clears_once() {
    let server = MockServer::start().await;
    let old = expired_jwt("old");
    const N: usize = 4;

    Mock::given(method("GET"))
        .and(path("/drivers"))
        .respond_with(ResponseTemplate::new(401))
        .expect(N as u64)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "refresh token revoked" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let remembered = Arc::new(CountingScope::default());
    let ephemeral = Arc::new(CountingScope::default());
    let store = TokenStore::new(remembered.clone(), ephemeral.clone());
    store
        .write(
            &fleetdesk::SessionCredential::new(old.clone()).with_refresh_token("refresh-1"),
            false,
        )
        .unwrap();
    let removals_after_login = remembered.access_removals.load(Ordering::SeqCst);

    let navigator = RecordingNavigator::at("/drivers");
    let client = client_with(&server.uri(), store, navigator.clone(), CountingObserver::new());

    let results = join_all((0..N).map(|_| client.get("/drivers"))).await;

    for result in results {
        let err = result.expect_err("every request should fail");
        assert_eq!(err.kind(), ApiErrorKind::SessionExpired);
        assert_eq!(err.status_code, 401);
    }
    for key in CredentialKey::ALL {
        assert_eq!(client.store().read(key).unwrap(), None);
    }
    assert_eq!(
        remembered.access_removals.load(Ordering::SeqCst) - removals_after_login,
        1
    );
    assert_eq!(navigator.visits(), vec!["/login?redirect=%2Fdrivers".to_string()]);
}

/// Without a refresh token the session ends immediately.
#[tokio::test]
async fn test_missing_refresh_token_ends_session_without_refresh_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let navigator = RecordingNavigator::at("/");
    let client = client_with(
        &server.uri(),
        store_with_session("stale", None, false),
        navigator.clone(),
        CountingObserver::new(),
    );

    let err = client.get("/vehicles").await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::SessionExpired);
    assert!(client.store().access_token().unwrap().is_none());
    assert_eq!(navigator.visits(), vec!["/login".to_string()]);
}

// ---------------------------------------------------------------------------
// Requests that must not refresh
// ---------------------------------------------------------------------------

/// A 401 from the login endpoint is a credentials error, never a refresh.
#[tokio::test]
async fn test_public_route_401_never_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "Credenciales inválidas" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let navigator = RecordingNavigator::at("/login");
    let client = client_with(
        &server.uri(),
        store_with_session("stale", Some("refresh-1"), true),
        navigator.clone(),
        CountingObserver::new(),
    );

    let err = client
        .login(&LoginCredentials::new("ops@example.com", "wrong"), true)
        .await
        .unwrap_err();
    let api_err = err
        .downcast_ref::<fleetdesk::FleetdeskError>()
        .and_then(|e| match e {
            fleetdesk::FleetdeskError::Api(api) => Some(api.clone()),
            _ => None,
        })
        .expect("login failure should carry an ApiError");
    assert_eq!(api_err.kind(), ApiErrorKind::InvalidCredentials);
    assert_eq!(api_err.message, "Credenciales inválidas");
    assert!(navigator.visits().is_empty());
}

/// A relocated login endpoint counts as public even when the public route
/// list does not name it.
#[tokio::test]
async fn test_custom_login_path_401_never_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/session"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let settings = ClientSettings {
        login_path: "/v2/session".to_string(),
        ..common::settings_for(&server.uri())
    };
    assert!(!settings.public_routes.iter().any(|r| r == "/v2/session"));
    let navigator = RecordingNavigator::at("/login");
    let client = ApiClient::new(settings, store_with_session("current", Some("refresh-1"), true))
        .unwrap()
        .with_navigator(navigator.clone());

    let err = client
        .login(&LoginCredentials::new("ops@example.com", "wrong"), true)
        .await
        .unwrap_err();
    match err.downcast_ref::<fleetdesk::FleetdeskError>() {
        Some(fleetdesk::FleetdeskError::Api(api)) => {
            assert_eq!(api.kind(), ApiErrorKind::InvalidCredentials)
        }
        other => panic!("expected an API error, got {other:?}"),
    }
    assert_eq!(
        client.store().access_token().unwrap().as_deref(),
        Some("current")
    );
    assert!(navigator.visits().is_empty());
}

/// A replayed request that is rejected again fails without a second
/// refresh.
#[tokio::test]
async fn test_retried_request_rejected_again_is_not_refreshed_twice() {
    let server = MockServer::start().await;
    let old = expired_jwt("old");
    let new = valid_jwt("new");

    Mock::given(method("GET"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "accessToken": new } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(
        &server.uri(),
        store_with_session(&old, Some("refresh-1"), true),
        RecordingNavigator::at("/reports"),
        CountingObserver::new(),
    );

    let err = client.get("/reports").await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::Unauthorized);
    // The refresh itself succeeded, so the session survives.
    assert_eq!(client.store().access_token().unwrap(), Some(new));
}

/// A 401 for a token that has since been replaced is replayed with the
/// stored token instead of starting another refresh.
#[tokio::test]
async fn test_stale_401_replays_with_stored_token() {
    let server = MockServer::start().await;
    let old = expired_jwt("old");
    let new = valid_jwt("new");

    Mock::given(method("GET"))
        .and(path("/drivers"))
        .and(header("Authorization", bearer(&old).as_str()))
        .respond_with(
            ResponseTemplate::new(401).set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drivers"))
        .and(header("Authorization", bearer(&new).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_with(
        &server.uri(),
        store_with_session(&old, Some("refresh-1"), true),
        RecordingNavigator::at("/drivers"),
        CountingObserver::new(),
    );

    let store = client.store().clone();
    let request = client.get("/drivers");
    let rotate = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.update_access_token(&new, None).unwrap();
    };
    let (result, ()) = tokio::join!(request, rotate);

    assert_eq!(result.unwrap().data, json!([]));
}

// ---------------------------------------------------------------------------
// End-to-end scenario and cancellation
// ---------------------------------------------------------------------------

/// Login without "remember", expire, refresh from the ephemeral scope, and
/// get the original response back unchanged.
#[tokio::test]
async fn test_ephemeral_login_refresh_and_retry() {
    let server = MockServer::start().await;
    let first = expired_jwt("first");
    let second = valid_jwt("second");

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": "ops@example.com", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "accessToken": first,
                "refreshToken": "refresh-1",
                "user": { "id": 7, "name": "Marta" },
                "expiresIn": 900
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "accessToken": second, "refreshToken": "refresh-2" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_drivers(&server, &first, &second, 1).await;

    let client = client_with(
        &server.uri(),
        TokenStore::in_memory(),
        RecordingNavigator::at("/drivers"),
        CountingObserver::new(),
    );

    let credential = client
        .login(&LoginCredentials::new("ops@example.com", "pw"), false)
        .await
        .unwrap();
    assert_eq!(credential.expires_in, Some(900));
    assert_eq!(client.store().active_scope().unwrap(), Some(ScopeKind::Ephemeral));
    assert!(!client.is_authenticated());

    let response = client.get("/drivers").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.data, json!({ "items": [{ "id": 1 }] }));

    let store = client.store();
    assert_eq!(store.active_scope().unwrap(), Some(ScopeKind::Ephemeral));
    assert_eq!(store.refresh_token().unwrap().as_deref(), Some("refresh-2"));
    assert_eq!(store.user().unwrap(), Some(json!({ "id": 7, "name": "Marta" })));
    assert!(client.is_authenticated());
}

/// Cancelling the refresh leader releases parked requests with an error.
#[tokio::test]
async fn test_cancelled_leader_releases_waiters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drivers"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let coordinator = RefreshCoordinator::new();
    let client: ApiClient = client_with(
        &server.uri(),
        store_with_session("old", Some("refresh-1"), true),
        RecordingNavigator::at("/drivers"),
        CountingObserver::new(),
    )
    .with_refresh_coordinator(coordinator.clone());

    let leader_client = client.clone();
    let leader = tokio::spawn(async move { leader_client.get("/drivers").await });
    while !coordinator.is_refreshing() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let waiter_client = client.clone();
    let waiter = tokio::spawn(async move { waiter_client.get("/drivers").await });
    while coordinator.queued() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    leader.abort();
    let result = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("waiter should be released")
        .expect("waiter task should not panic");

    assert_eq!(result.unwrap_err().kind(), ApiErrorKind::SessionExpired);
    assert!(!coordinator.is_refreshing());
}
