//! Command-line interface definition for Fleetdesk
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for session management and authenticated requests
//! against the console backend.

use clap::{Parser, Subcommand};

use crate::config::SessionBackend;

/// Fleetdesk - operator CLI for the transport admin console API
///
/// Log in once, then issue authenticated requests; expired access tokens
/// are refreshed transparently.
#[derive(Parser, Debug, Clone)]
#[command(name = "fleetdesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the API base URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Override where remembered sessions are stored (keyring, file, memory)
    #[arg(long)]
    pub session_backend: Option<SessionBackend>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Fleetdesk
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Log in and store the session
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "FLEETDESK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Keep the session after this process exits
        #[arg(short, long)]
        remember: bool,
    },

    /// Clear the stored session
    Logout,

    /// Show the stored session
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Issue an authenticated request and print the response body
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Request path relative to the API base URL
        path: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Start an interactive session whose non-remembered logins last until exit
    Shell,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login() {
        let cli = Cli::try_parse_from([
            "fleetdesk",
            "login",
            "--email",
            "ops@example.com",
            "--password",
            "pw",
            "--remember",
        ])
        .unwrap();
        match cli.command {
            Commands::Login {
                email,
                password,
                remember,
            } => {
                assert_eq!(email, "ops@example.com");
                assert_eq!(password, "pw");
                assert!(remember);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_request_with_body() {
        let cli = Cli::try_parse_from([
            "fleetdesk",
            "request",
            "post",
            "/turnos",
            "--data",
            r#"{"driverId":3}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Request { method, path, data } => {
                assert_eq!(method, "post");
                assert_eq!(path, "/turnos");
                assert_eq!(data.as_deref(), Some(r#"{"driverId":3}"#));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "fleetdesk",
            "--api-url",
            "http://127.0.0.1:9000/api",
            "--session-backend",
            "file",
            "status",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://127.0.0.1:9000/api"));
        assert_eq!(cli.session_backend, Some(SessionBackend::File));
        assert!(matches!(cli.command, Commands::Status { json: true }));
    }

    #[test]
    fn test_invalid_session_backend_rejected() {
        let result = Cli::try_parse_from(["fleetdesk", "--session-backend", "vault", "logout"]);
        assert!(result.is_err());
    }
}
