//! Error types for Fleetdesk
//!
//! This module defines the crate-level error enum used by configuration,
//! session storage, and the CLI, using `thiserror` for ergonomic error
//! handling. Errors produced by the API client itself are normalized into
//! [`ApiError`](crate::client::ApiError) and wrapped here when they cross
//! into the rest of the application.

use thiserror::Error;

use crate::client::ApiError;

/// Main error type for Fleetdesk operations
///
/// This enum covers configuration loading, credential persistence, and
/// transport failures that happen outside the normalized API error path.
#[derive(Error, Debug)]
pub enum FleetdeskError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential scope read/write failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid command input (bad HTTP method, malformed JSON body, etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Normalized API errors surfaced by the client
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for Fleetdesk operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiErrorKind;

    #[test]
    fn test_config_error_display() {
        let error = FleetdeskError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_storage_error_display() {
        let error = FleetdeskError::Storage("session file unreadable".to_string());
        assert_eq!(error.to_string(), "Storage error: session file unreadable");
    }

    #[test]
    fn test_api_error_conversion() {
        let api = ApiError::forbidden(None);
        let error: FleetdeskError = api.into();
        match error {
            FleetdeskError::Api(inner) => assert_eq!(inner.kind(), ApiErrorKind::Forbidden),
            other => panic!("expected Api variant, got {other:?}"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: FleetdeskError = io_error.into();
        assert!(matches!(error, FleetdeskError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: FleetdeskError = json_error.into();
        assert!(matches!(error, FleetdeskError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: FleetdeskError = yaml_error.into();
        assert!(matches!(error, FleetdeskError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FleetdeskError>();
    }
}
