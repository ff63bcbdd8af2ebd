//! Session commands: login, logout, status

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use crate::client::{ApiClient, LoginCredentials};
use crate::error::Result;
use crate::session::{jwt, ScopeKind};

/// Snapshot of the stored session, as printed by `fleetdesk status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub authenticated: bool,
    pub scope: Option<String>,
    pub expires_at: Option<String>,
    pub has_refresh_token: bool,
    pub user: Option<Value>,
}

/// Collects the current session state from the client's token store.
pub fn session_status(client: &ApiClient) -> Result<SessionStatus> {
    let store = client.store();
    let access = store.access_token()?;
    Ok(SessionStatus {
        authenticated: client.is_authenticated(),
        scope: store.active_scope()?.map(|s| s.to_string()),
        expires_at: access
            .as_deref()
            .and_then(jwt::expires_at)
            .map(|at| at.to_rfc3339()),
        has_refresh_token: store.refresh_token()?.is_some(),
        user: store.user()?,
    })
}

/// Logs in and reports where the session was stored.
pub async fn login(client: &ApiClient, email: &str, password: &str, remember: bool) -> Result<()> {
    let credential = client
        .login(&LoginCredentials::new(email, password), remember)
        .await?;

    let name = credential
        .user
        .as_ref()
        .and_then(|u| u.get("name").or_else(|| u.get("email")))
        .and_then(Value::as_str)
        .unwrap_or(email);
    println!("{}", format!("Logged in as {}", name).green());

    if ScopeKind::from_remember(remember) == ScopeKind::Ephemeral {
        println!(
            "{}",
            "Session is not remembered; it ends when this process exits.".yellow()
        );
    }
    Ok(())
}

/// Clears the stored session.
pub fn logout(client: &ApiClient) -> Result<()> {
    client.logout()?;
    println!("{}", "Logged out.".green());
    Ok(())
}

/// Prints the stored session.
pub fn status(client: &ApiClient, json: bool) -> Result<()> {
    let status = session_status(client)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match status.scope {
        None => println!("{}", "Not logged in.".yellow()),
        Some(ref scope) => {
            let state = if status.authenticated {
                "valid".green()
            } else {
                "expired".red()
            };
            println!("Session:        {} ({})", state, scope);
            println!(
                "Expires at:     {}",
                status.expires_at.as_deref().unwrap_or("-")
            );
            println!(
                "Refresh token:  {}",
                if status.has_refresh_token { "yes" } else { "no" }
            );
            if let Some(ref user) = status.user {
                println!("User:           {}", user);
            }
        }
    }
    Ok(())
}
