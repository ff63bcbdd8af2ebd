//! Refresh coalescing
//!
//! When several requests fail authentication at once, only the first one
//! (the *leader*) performs the token refresh. Every other request parks a
//! waiter in a FIFO queue and is woken with the leader's outcome.
//!
//! ```text
//!            begin() while Idle
//!   Idle ─────────────────────────▶ Refreshing { queue }
//!    ▲                                  │  begin() enqueues a waiter
//!    └──────── RefreshGuard::settle ◀───┘  (or guard dropped)
//! ```
//!
//! Every settle bumps a generation counter. A request records the
//! generation before it is sent and passes it to
//! [`RefreshCoordinator::begin_after`], so a `401` that arrives after an
//! episode already settled is told so instead of starting a second
//! refresh. The check-and-transition happens under one lock acquisition
//! and the lock is never held across an await.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::client::error::{ApiError, ApiResult};

type Waiter = oneshot::Sender<ApiResult<String>>;

#[derive(Debug)]
enum RefreshState {
    Idle,
    Refreshing { queue: VecDeque<Waiter> },
}

#[derive(Debug)]
struct Inner {
    state: RefreshState,
    generation: u64,
}

/// Outcome of [`RefreshCoordinator::begin`] and
/// [`RefreshCoordinator::begin_after`].
#[derive(Debug)]
pub enum RefreshTicket {
    /// The caller must perform the refresh and settle the guard.
    Leader(RefreshGuard),
    /// A refresh is in flight; await the receiver for its outcome.
    Waiter(oneshot::Receiver<ApiResult<String>>),
    /// An episode settled after the caller's request was sent. The token
    /// store already holds its outcome.
    Settled,
}

/// Process-wide refresh state, shared by every request of one client.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Mutex<Inner>>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: RefreshState::Idle,
                generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of episodes settled so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Becomes the leader of a new refresh, or joins the one in flight.
    pub fn begin(&self) -> RefreshTicket {
        let mut inner = self.lock();
        Self::enter(&mut inner, self)
    }

    /// Like [`begin`](Self::begin), but returns [`RefreshTicket::Settled`]
    /// when an episode settled since generation `seen` was observed.
    pub fn begin_after(&self, seen: u64) -> RefreshTicket {
        let mut inner = self.lock();
        if matches!(inner.state, RefreshState::Idle) && inner.generation != seen {
            tracing::debug!(
                seen,
                current = inner.generation,
                "Token refresh already settled"
            );
            return RefreshTicket::Settled;
        }
        Self::enter(&mut inner, self)
    }

    fn enter(inner: &mut Inner, coordinator: &RefreshCoordinator) -> RefreshTicket {
        if let RefreshState::Refreshing { queue } = &mut inner.state {
            let (tx, rx) = oneshot::channel();
            queue.push_back(tx);
            tracing::debug!(queued = queue.len(), "Request parked behind token refresh");
            return RefreshTicket::Waiter(rx);
        }

        inner.state = RefreshState::Refreshing {
            queue: VecDeque::new(),
        };
        tracing::debug!("Token refresh started");
        RefreshTicket::Leader(RefreshGuard {
            coordinator: coordinator.clone(),
            settled: false,
        })
    }

    /// Returns `true` while a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(self.lock().state, RefreshState::Refreshing { .. })
    }

    /// Number of parked waiters.
    pub fn queued(&self) -> usize {
        match &self.lock().state {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { queue } => queue.len(),
        }
    }

    fn finish(&self, outcome: ApiResult<String>) {
        let queue = {
            let mut inner = self.lock();
            inner.generation += 1;
            match std::mem::replace(&mut inner.state, RefreshState::Idle) {
                RefreshState::Idle => VecDeque::new(),
                RefreshState::Refreshing { queue } => queue,
            }
        };

        tracing::debug!(
            waiters = queue.len(),
            success = outcome.is_ok(),
            "Token refresh settled"
        );
        for waiter in queue {
            // A dropped receiver means its request was cancelled.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Leadership of one refresh episode.
///
/// Settling returns the coordinator to idle and wakes every waiter in FIFO
/// order. A guard dropped without settling (for example when the leader's
/// future is cancelled) settles with [`ApiError::session_expired`].
#[derive(Debug)]
pub struct RefreshGuard {
    coordinator: RefreshCoordinator,
    settled: bool,
}

impl RefreshGuard {
    pub fn settle(mut self, outcome: ApiResult<String>) {
        self.settled = true;
        self.coordinator.finish(outcome);
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Token refresh abandoned before completion");
            self.coordinator.finish(Err(ApiError::session_expired()));
        }
    }
}
