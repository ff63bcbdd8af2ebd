/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `auth`    - Login, logout, and session status
- `request` - One authenticated request
- `shell`   - Interactive session keeping one client alive

Every handler builds its [`ApiClient`] through [`build_client`], which wires
the configured remembered scope, a process-lifetime ephemeral scope, and the
CLI collaborators.
*/

use std::sync::{Arc, Mutex};

use crate::client::hooks::TracingLoadingObserver;
use crate::client::{ApiClient, ClientSettings, Navigator};
use crate::config::{Config, SessionBackend};
use crate::error::Result;
use crate::session::{CredentialScope, FileScope, KeyringScope, MemoryScope, TokenStore};

pub mod auth;
pub mod request;
pub mod shell;

/// Navigator for a terminal session.
///
/// Tracks the "current view" as the last path requested, and reports a
/// forced redirect to the login view instead of rendering it.
#[derive(Debug)]
pub struct CliNavigator {
    current: Mutex<String>,
}

impl CliNavigator {
    pub fn new() -> Self {
        Self {
            current: Mutex::new("/".to_string()),
        }
    }

    /// Records `path` as the view the operator is looking at.
    pub fn visit(&self, path: &str) {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = path.to_string();
    }
}

impl Default for CliNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for CliNavigator {
    fn current_path(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn navigate(&self, target: &str) {
        self.visit(target);
        eprintln!("Session ended. Run `fleetdesk login` to continue ({target}).");
    }
}

/// Builds the remembered scope selected by the configuration.
pub fn remembered_scope(config: &Config) -> Result<Arc<dyn CredentialScope>> {
    let scope: Arc<dyn CredentialScope> = match config.session.backend {
        SessionBackend::Keyring => Arc::new(KeyringScope::new(
            config
                .session
                .keyring_service
                .clone()
                .unwrap_or_else(|| KeyringScope::DEFAULT_SERVICE.to_string()),
        )),
        SessionBackend::File => {
            let path = match config.session.file_path {
                Some(ref path) => path.clone(),
                None => FileScope::default_path()?,
            };
            tracing::debug!(path = %path.display(), "Using file session scope");
            Arc::new(FileScope::new(path))
        }
        SessionBackend::Memory => Arc::new(MemoryScope::new()),
    };
    Ok(scope)
}

/// Builds a client over the configured token store.
pub fn build_client(config: &Config, navigator: Arc<CliNavigator>) -> Result<ApiClient> {
    let store = TokenStore::new(remembered_scope(config)?, Arc::new(MemoryScope::new()));
    let client = ApiClient::new(ClientSettings::from_config(config), store)?
        .with_loading_observer(Arc::new(TracingLoadingObserver))
        .with_navigator(navigator);
    Ok(client)
}
