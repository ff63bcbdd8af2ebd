//! Interactive shell
//!
//! Keeps one [`ApiClient`] alive for the whole session. A login without
//! `--remember` lives in the ephemeral scope and disappears when the shell
//! exits, the way a browser tab session would.

use std::sync::Arc;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::{auth, build_client, request, CliNavigator};
use crate::config::Config;
use crate::error::Result;

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Login {
        email: String,
        password: String,
        remember: bool,
    },
    Logout,
    Status,
    Request {
        method: String,
        path: String,
        data: Option<String>,
    },
    Help,
    Exit,
    Empty,
}

/// Parses one line of shell input.
///
/// Request bodies may contain spaces; everything after the path is taken
/// verbatim.
pub fn parse_line(line: &str) -> std::result::Result<ShellCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ShellCommand::Empty);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_ascii_lowercase().as_str() {
        "exit" | "quit" => Ok(ShellCommand::Exit),
        "help" | "?" => Ok(ShellCommand::Help),
        "logout" => Ok(ShellCommand::Logout),
        "status" => Ok(ShellCommand::Status),
        "login" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let remember = args.contains(&"--remember");
            let positional: Vec<&str> = args
                .into_iter()
                .filter(|a| *a != "--remember")
                .collect();
            match positional.as_slice() {
                [email, password] => Ok(ShellCommand::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                    remember,
                }),
                _ => Err("usage: login <email> <password> [--remember]".to_string()),
            }
        }
        method @ ("get" | "post" | "put" | "patch" | "delete") => {
            if rest.is_empty() {
                return Err(format!("usage: {} <path> [json]", method));
            }
            let (path, data) = match rest.split_once(char::is_whitespace) {
                Some((path, data)) => (path, Some(data.trim().to_string())),
                None => (rest, None),
            };
            Ok(ShellCommand::Request {
                method: method.to_string(),
                path: path.to_string(),
                data,
            })
        }
        other => Err(format!("unknown command: {} (try `help`)", other)),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  login <email> <password> [--remember]");
    println!("  logout");
    println!("  status");
    println!("  get|delete <path>");
    println!("  post|put|patch <path> <json>");
    println!("  help");
    println!("  exit");
}

/// Runs the interactive loop until `exit` or end of input.
pub async fn run_shell(config: Config) -> Result<()> {
    let navigator = Arc::new(CliNavigator::new());
    let client = build_client(&config, Arc::clone(&navigator))?;
    let mut rl = DefaultEditor::new()?;

    println!(
        "{} connected to {} (type `help`)",
        "fleetdesk".bold(),
        config.api.base_url
    );

    loop {
        let line = match rl.readline("fleetdesk> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let _ = rl.add_history_entry(line.as_str());

        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{}", message.yellow());
                continue;
            }
        };

        let outcome = match command {
            ShellCommand::Empty => Ok(()),
            ShellCommand::Exit => break,
            ShellCommand::Help => {
                print_help();
                Ok(())
            }
            ShellCommand::Status => auth::status(&client, false),
            ShellCommand::Logout => auth::logout(&client),
            ShellCommand::Login {
                email,
                password,
                remember,
            } => auth::login(&client, &email, &password, remember).await,
            ShellCommand::Request { method, path, data } => {
                request::run_request(&client, &navigator, &method, &path, data.as_deref()).await
            }
        };

        if let Err(e) = outcome {
            eprintln!("{}", format!("Error: {:#}", e).red());
        }
    }

    tracing::info!("Shell session ended");
    Ok(())
}
