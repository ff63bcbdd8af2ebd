//! Fleetdesk - authenticated API client for the transport admin console
//!
//! This library provides the REST client the console uses to talk to its
//! backend: session persistence across a remembered and an ephemeral scope,
//! bearer-token request interception, and transparent token refresh with
//! request coalescing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: Token store, persistence scopes, and JWT expiry checks
//! - `client`: The API client, its interceptors, and normalized errors
//! - `config`: Configuration management and validation
//! - `commands`: Handlers behind the `fleetdesk` binary
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use fleetdesk::client::{ApiClient, ClientSettings, LoginCredentials};
//! use fleetdesk::session::TokenStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ApiClient::new(ClientSettings::default(), TokenStore::in_memory())?;
//!     client
//!         .login(&LoginCredentials::new("ops@example.com", "secret"), false)
//!         .await?;
//!
//!     let routes = client.get("/routes").await?;
//!     println!("{}", routes.data);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod session;

// Re-export commonly used types
pub use client::{ApiClient, ApiError, ApiErrorKind, ApiResponse, ClientSettings};
pub use config::Config;
pub use error::{FleetdeskError, Result};
pub use session::{SessionCredential, TokenStore};
