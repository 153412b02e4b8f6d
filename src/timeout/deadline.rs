//! Deadline-bound cancellable request context.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// The deadline a request runs under.
///
/// Inserted into the request extensions by [`TimeoutService`](super::TimeoutService)
/// so handlers can extract it and stop early once it is cancelled.
#[derive(Debug, Clone)]
pub struct RequestDeadline {
    expires_at: Instant,
    token: CancellationToken,
}

impl RequestDeadline {
    /// A fresh deadline `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now() + timeout,
            token: CancellationToken::new(),
        }
    }

    /// Derive a child deadline. The result never outlives its parent: it expires
    /// at the earlier of the two instants and is cancelled with the parent.
    pub fn derive(parent: Option<&RequestDeadline>, timeout: Duration) -> Self {
        let expires_at = Instant::now() + timeout;
        match parent {
            Some(parent) => Self {
                expires_at: expires_at.min(parent.expires_at),
                token: parent.token.child_token(),
            },
            None => Self {
                expires_at,
                token: CancellationToken::new(),
            },
        }
    }

    /// Instant after which the request is considered timed out.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left before expiry, zero once passed.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the deadline is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Resolves at expiry or on cancellation, whichever comes first.
    pub async fn expired(&self) {
        tokio::select! {
            _ = tokio::time::sleep_until(self.expires_at) => {}
            _ = self.token.cancelled() => {}
        }
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels the deadline when dropped.
    pub(crate) fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }
}

/// Marker extension on a response produced by the timeout path.
///
/// Outer layers check for it to stop further processing of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;
