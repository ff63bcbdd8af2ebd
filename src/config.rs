//! Configuration management for Fleetdesk
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::client::routes::DEFAULT_PUBLIC_ROUTES;
use crate::error::{FleetdeskError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Fleetdesk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Credential persistence settings
    #[serde(default)]
    pub session: SessionConfig,
    /// Navigation targets used on forced logout
    #[serde(default)]
    pub navigation: NavigationConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Login endpoint path
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Token refresh endpoint path
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Routes reachable without an access token; a 401 on these is a
    /// credentials error and never triggers a refresh
    #[serde(default = "default_public_routes")]
    pub public_routes: Vec<String>,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_public_routes() -> Vec<String> {
    DEFAULT_PUBLIC_ROUTES.iter().map(|s| s.to_string()).collect()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            public_routes: default_public_routes(),
        }
    }
}

/// Where remembered sessions are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// OS native credential store
    #[default]
    Keyring,
    /// JSON file in the user data directory
    File,
    /// Process memory only; nothing survives a restart
    Memory,
}

impl std::str::FromStr for SessionBackend {
    type Err = FleetdeskError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyring" => Ok(SessionBackend::Keyring),
            "file" => Ok(SessionBackend::File),
            "memory" => Ok(SessionBackend::Memory),
            other => Err(FleetdeskError::Config(format!(
                "Invalid session backend: {}. Must be one of: keyring, file, memory",
                other
            ))),
        }
    }
}

/// Credential persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend for the remembered scope
    #[serde(default)]
    pub backend: SessionBackend,

    /// Session file location for the `file` backend; defaults to the user
    /// data directory
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Keyring service name for the `keyring` backend
    #[serde(default)]
    pub keyring_service: Option<String>,
}

/// Navigation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Login view path
    #[serde(default = "default_login_view")]
    pub login_view: String,
}

fn default_login_view() -> String {
    "/login".to_string()
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            login_view: default_login_view(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FleetdeskError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| FleetdeskError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("FLEETDESK_API_BASE_URL") {
            tracing::debug!(base_url = %base_url, "Env override: FLEETDESK_API_BASE_URL");
            self.api.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("FLEETDESK_TIMEOUT_SECONDS") {
            if let Ok(v) = timeout.parse() {
                self.api.timeout_seconds = v;
            } else {
                tracing::warn!("Invalid FLEETDESK_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(backend) = std::env::var("FLEETDESK_SESSION_BACKEND") {
            match backend.parse() {
                Ok(v) => self.session.backend = v,
                Err(e) => tracing::warn!("Invalid FLEETDESK_SESSION_BACKEND: {}", e),
            }
        }

        if let Ok(file) = std::env::var("FLEETDESK_SESSION_FILE") {
            tracing::debug!(file = %file, "Env override: FLEETDESK_SESSION_FILE");
            self.session.file_path = Some(PathBuf::from(file));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(ref base_url) = cli.api_url {
            self.api.base_url = base_url.clone();
        }
        if let Some(backend) = cli.session_backend {
            self.session.backend = backend;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url).map_err(|e| {
            FleetdeskError::Config(format!("Invalid api.base_url {}: {}", self.api.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FleetdeskError::Config(format!(
                "api.base_url must use http or https, got {}",
                url.scheme()
            ))
            .into());
        }

        if self.api.timeout_seconds == 0 {
            return Err(FleetdeskError::Config(
                "api.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.api.timeout_seconds > 600 {
            return Err(FleetdeskError::Config(
                "api.timeout_seconds must be less than or equal to 600".to_string(),
            )
            .into());
        }

        for (name, path) in [
            ("api.login_path", &self.api.login_path),
            ("api.refresh_path", &self.api.refresh_path),
            ("navigation.login_view", &self.navigation.login_view),
        ] {
            if !path.starts_with('/') {
                return Err(FleetdeskError::Config(format!(
                    "{} must start with '/': {}",
                    name, path
                ))
                .into());
            }
        }

        if let Some(route) = self.api.public_routes.iter().find(|r| !r.starts_with('/')) {
            return Err(FleetdeskError::Config(format!(
                "api.public_routes entries must start with '/': {}",
                route
            ))
            .into());
        }

        if crate::client::routes::is_public_route(&self.api.refresh_path, &self.api.public_routes)
        {
            return Err(FleetdeskError::Config(
                "api.refresh_path must not be listed in api.public_routes".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
