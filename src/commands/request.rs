//! One-shot authenticated request

use reqwest::Method;
use serde_json::Value;

use crate::client::ApiClient;
use crate::commands::CliNavigator;
use crate::error::{FleetdeskError, Result};

/// Parses an HTTP method name, case-insensitively.
pub fn parse_method(method: &str) -> Result<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(FleetdeskError::InvalidInput(format!(
            "Unsupported HTTP method: {}. Must be one of: GET, POST, PUT, PATCH, DELETE",
            other
        ))
        .into()),
    }
}

/// Parses an optional JSON request body.
pub fn parse_body(data: Option<&str>) -> Result<Option<Value>> {
    match data {
        None => Ok(None),
        Some(raw) => serde_json::from_str(raw).map(Some).map_err(|e| {
            FleetdeskError::InvalidInput(format!("Request body is not valid JSON: {}", e)).into()
        }),
    }
}

/// Issues the request and prints the response body as pretty JSON.
pub async fn run_request(
    client: &ApiClient,
    navigator: &CliNavigator,
    method: &str,
    path: &str,
    data: Option<&str>,
) -> Result<()> {
    let method = parse_method(method)?;
    let body = parse_body(data)?;

    navigator.visit(path);
    let response = client.request(method, path, body).await?;
    tracing::debug!(
        status = response.status,
        request_id = %response.request_id,
        "Request completed"
    );

    match response.data {
        Value::Null => {}
        Value::String(ref text) => println!("{}", text),
        ref data => println!("{}", serde_json::to_string_pretty(data)?),
    }
    Ok(())
}
