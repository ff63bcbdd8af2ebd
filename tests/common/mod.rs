use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use tempfile::TempDir;

use fleetdesk::client::{ApiClient, ClientSettings, LoadingObserver, Navigator};
use fleetdesk::session::{SessionCredential, TokenStore};

/// Builds an unsigned JWT carrying `claims`.
#[allow(dead_code)]
pub fn jwt_with_claims(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// A JWT that expires in the year 2100, tagged with `sub` so tokens differ.
#[allow(dead_code)]
pub fn valid_jwt(sub: &str) -> String {
    jwt_with_claims(&json!({ "sub": sub, "exp": 4_102_444_800_i64 }))
}

/// A JWT that expired in 2001.
#[allow(dead_code)]
pub fn expired_jwt(sub: &str) -> String {
    jwt_with_claims(&json!({ "sub": sub, "exp": 1_000_000_000_i64 }))
}

#[allow(dead_code)]
pub fn settings_for(base_url: &str) -> ClientSettings {
    ClientSettings {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        ..ClientSettings::default()
    }
}

/// A store holding `access` and `refresh` in the given scope.
#[allow(dead_code)]
pub fn store_with_session(access: &str, refresh: Option<&str>, remember: bool) -> TokenStore {
    let store = TokenStore::in_memory();
    let mut credential = SessionCredential::new(access);
    if let Some(refresh) = refresh {
        credential = credential.with_refresh_token(refresh);
    }
    store
        .write(&credential, remember)
        .expect("write session to memory store");
    store
}

/// Navigator that records every navigation.
#[allow(dead_code)]
#[derive(Debug)]
pub struct RecordingNavigator {
    current: Mutex<String>,
    visits: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingNavigator {
    pub fn at(path: &str) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(path.to_string()),
            visits: Mutex::new(Vec::new()),
        })
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.current.lock().unwrap().clone()
    }

    fn navigate(&self, target: &str) {
        *self.current.lock().unwrap() = target.to_string();
        self.visits.lock().unwrap().push(target.to_string());
    }
}

/// Loading observer that counts notifications and tracks in-flight ids.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct CountingObserver {
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
    in_flight: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl CountingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}

impl LoadingObserver for CountingObserver {
    fn request_started(&self, request_id: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.in_flight.lock().unwrap().push(request_id.to_string());
    }

    fn request_finished(&self, request_id: &str) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.in_flight.lock().unwrap().retain(|id| id != request_id);
    }
}

/// A client against `base_url` with the given collaborators.
#[allow(dead_code)]
pub fn client_with(
    base_url: &str,
    store: TokenStore,
    navigator: Arc<RecordingNavigator>,
    observer: Arc<CountingObserver>,
) -> ApiClient {
    ApiClient::new(settings_for(base_url), store)
        .expect("build client")
        .with_navigator(navigator)
        .with_loading_observer(observer)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
