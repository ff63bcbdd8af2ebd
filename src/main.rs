//! Fleetdesk - operator CLI for the transport admin console API
//!
#![doc = "Main entry point for the fleetdesk binary."]

use std::sync::Arc;

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fleetdesk::cli::{Cli, Commands};
use fleetdesk::commands::{self, auth, request, shell, CliNavigator};
use fleetdesk::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    let navigator = Arc::new(CliNavigator::new());

    // Execute command
    match cli.command {
        Commands::Login {
            email,
            password,
            remember,
        } => {
            tracing::info!("Logging in as {}", email);
            let client = commands::build_client(&config, navigator)?;
            auth::login(&client, &email, &password, remember).await?;
            Ok(())
        }
        Commands::Logout => {
            let client = commands::build_client(&config, navigator)?;
            auth::logout(&client)?;
            Ok(())
        }
        Commands::Status { json } => {
            let client = commands::build_client(&config, navigator)?;
            auth::status(&client, json)?;
            Ok(())
        }
        Commands::Request { method, path, data } => {
            tracing::debug!("Request {} {}", method, path);
            let client = commands::build_client(&config, Arc::clone(&navigator))?;
            request::run_request(&client, &navigator, &method, &path, data.as_deref()).await?;
            Ok(())
        }
        Commands::Shell => {
            tracing::info!("Starting interactive shell");
            shell::run_shell(config).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "fleetdesk=debug"
    } else {
        "fleetdesk=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
