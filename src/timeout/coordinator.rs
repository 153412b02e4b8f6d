//! Race between handler completion and deadline expiry.
//!
//! # States
//! ```text
//! Running → Completed: handler returned before the deadline
//! Running → TimedOut:  deadline elapsed (or the parent context was cancelled)
//! Running → Failed:    handler panicked or returned an error
//! ```
//!
//! # Design Decisions
//! - The handler runs on its own Tokio task, one per request
//! - A timed-out handler task is detached, not aborted; it sees its
//!   [`RequestDeadline`] cancelled and may stop early
//! - When completion and expiry are ready in the same poll, completion wins
//! - Panics are resumed on the caller's task with the original payload

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::response::Response;

use super::capture::{ResponseCapture, ResponseSink};
use super::deadline::{DeadlineExceeded, RequestDeadline};
use super::policy::TimeoutPolicy;
use crate::observability::metrics;

/// Why the handler did not complete.
pub enum Failure<E> {
    /// The handler panicked; holds the panic payload.
    Panic(Box<dyn Any + Send + 'static>),
    /// The handler returned an error.
    Error(E),
}

impl<E> fmt::Debug for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Panic(_) => f.write_str("Panic(..)"),
            Failure::Error(_) => f.write_str("Error(..)"),
        }
    }
}

/// Result of the race, produced exactly once per request.
#[derive(Debug)]
pub enum Outcome<E> {
    Completed,
    TimedOut,
    Failed(Failure<E>),
}

impl<E> Outcome<E> {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::TimedOut => "timed_out",
            Outcome::Failed(_) => "failed",
        }
    }
}

/// Runs handlers against the deadline of a shared [`TimeoutPolicy`].
#[derive(Debug, Clone)]
pub struct RaceCoordinator {
    policy: Arc<TimeoutPolicy>,
}

impl RaceCoordinator {
    pub fn new(policy: TimeoutPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    /// Run `handler` under a deadline derived from `parent` and commit exactly
    /// one response.
    ///
    /// The handler receives the derived deadline and the capture it must write
    /// its response into. A handler error is returned as-is; a handler panic
    /// is resumed on the calling task.
    pub async fn run<H, Fut, E>(
        &self,
        parent: Option<&RequestDeadline>,
        handler: H,
    ) -> Result<Response, E>
    where
        H: FnOnce(RequestDeadline, Arc<ResponseCapture>) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        let start_time = Instant::now();
        let deadline = RequestDeadline::derive(parent, self.policy.deadline());
        let _cancel_on_exit = deadline.drop_guard();
        let capture = Arc::new(ResponseCapture::new());
        let sink = ResponseSink::new();

        let mut task = tokio::spawn(handler(deadline.clone(), capture.clone()));

        let outcome = tokio::select! {
            biased;
            joined = &mut task => match joined {
                Ok(Ok(())) => Outcome::Completed,
                Ok(Err(err)) => Outcome::Failed(Failure::Error(err)),
                // Only a shutting-down runtime cancels the task; surface it as a panic.
                Err(join_err) => match join_err.try_into_panic() {
                    Ok(payload) => Outcome::Failed(Failure::Panic(payload)),
                    Err(join_err) => Outcome::Failed(Failure::Panic(Box::new(join_err.to_string()))),
                },
            },
            _ = deadline.expired() => Outcome::TimedOut,
        };

        metrics::record_outcome(outcome.label(), start_time);

        match outcome {
            Outcome::Completed => {
                tracing::debug!(elapsed = ?start_time.elapsed(), "Handler completed before deadline");
                Ok(capture.commit_normal(sink))
            }
            Outcome::TimedOut => {
                deadline.cancel();
                let mut response = capture.commit_timeout(sink, &self.policy);
                response.extensions_mut().insert(DeadlineExceeded);
                tracing::debug!(
                    deadline = ?self.policy.deadline(),
                    status = %self.policy.timeout_status(),
                    buffered_bytes = capture.buffered_len(),
                    "Handler exceeded deadline, sent timeout response"
                );
                // Dropping the handle detaches the handler task.
                drop(task);
                Ok(response)
            }
            Outcome::Failed(Failure::Error(err)) => Err(err),
            Outcome::Failed(Failure::Panic(payload)) => std::panic::resume_unwind(payload),
        }
    }
}
