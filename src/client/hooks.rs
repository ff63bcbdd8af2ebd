//! Collaborators injected into the client
//!
//! The client never owns UI state. It reports request lifecycles to a
//! [`LoadingObserver`] and asks a [`Navigator`] to move to the login view
//! when a session ends.

/// Receives request lifecycle notifications, keyed by request id.
///
/// `request_finished` is called exactly once for every `request_started`,
/// whether the request succeeded or failed.
pub trait LoadingObserver: Send + Sync {
    fn request_started(&self, request_id: &str);
    fn request_finished(&self, request_id: &str);
}

/// Ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLoadingObserver;

impl LoadingObserver for NoopLoadingObserver {
    fn request_started(&self, _request_id: &str) {}
    fn request_finished(&self, _request_id: &str) {}
}

/// Emits lifecycle notifications as `tracing` debug events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLoadingObserver;

impl LoadingObserver for TracingLoadingObserver {
    fn request_started(&self, request_id: &str) {
        tracing::debug!(request_id, "Request started");
    }

    fn request_finished(&self, request_id: &str) {
        tracing::debug!(request_id, "Request finished");
    }
}

/// Navigation primitive used for the forced redirect to the login view.
pub trait Navigator: Send + Sync {
    /// The path currently shown to the user.
    fn current_path(&self) -> String;

    /// Moves to `target` (a path, possibly with a query string).
    fn navigate(&self, target: &str);
}

/// A navigator that stays at `/` and ignores navigation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_path(&self) -> String {
        "/".to_string()
    }

    fn navigate(&self, _target: &str) {}
}
