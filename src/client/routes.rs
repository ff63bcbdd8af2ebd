//! Route classification for the interceptors

/// Routes reachable without an access token.
pub const DEFAULT_PUBLIC_ROUTES: [&str; 5] = [
    "/auth/login",
    "/auth/register",
    "/auth/forgot-password",
    "/auth/reset-password",
    "/auth/verify-reset-token",
];

/// Strips the query string and any trailing slash.
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Returns `true` when `path` equals a public route or lives beneath one.
///
/// # Examples
///
/// ```
/// use fleetdesk::client::routes::is_public_route;
///
/// let public = vec!["/auth/login".to_string(), "/auth/reset-password".to_string()];
/// assert!(is_public_route("/auth/login?next=/trips", &public));
/// assert!(is_public_route("/auth/reset-password/abc123", &public));
/// assert!(!is_public_route("/auth/login-history", &public));
/// assert!(!is_public_route("/vehicles", &public));
/// ```
pub fn is_public_route(path: &str, public_routes: &[String]) -> bool {
    let path = normalize(path);
    public_routes.iter().any(|route| {
        let route = normalize(route);
        path == route
            || path
                .strip_prefix(route)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Returns `true` when `path` names the same endpoint as `route`, ignoring
/// a trailing slash and any query string.
pub fn is_same_route(path: &str, route: &str) -> bool {
    normalize(path) == normalize(route)
}

/// Computes where a forced logout should send the user.
///
/// Returns `None` when the user is already on the login view. Otherwise the
/// current path is preserved as a `redirect` query parameter, unless it is
/// the root.
pub fn login_redirect_target(login_view: &str, current_path: &str) -> Option<String> {
    if normalize(current_path) == normalize(login_view) {
        return None;
    }
    if current_path.is_empty() || current_path == "/" {
        return Some(login_view.to_string());
    }

    let encoded: String = url::form_urlencoded::byte_serialize(current_path.as_bytes()).collect();
    Some(format!("{login_view}?redirect={encoded}"))
}
