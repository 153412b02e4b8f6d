//! Route handlers used to exercise the timeout layer.

use std::time::Duration;

use axum::{http::StatusCode, Extension, Json};

use crate::timeout::RequestDeadline;

/// How long `/hello` works before answering.
pub const SLOW_HANDLER_DELAY: Duration = Duration::from_secs(3);

/// How long `/panic` works before failing.
pub const FAILING_HANDLER_DELAY: Duration = Duration::from_millis(100);

/// Ignores its deadline and answers after [`SLOW_HANDLER_DELAY`].
pub async fn hello() -> Json<&'static str> {
    tokio::time::sleep(SLOW_HANDLER_DELAY).await;
    Json("hello")
}

/// Answers immediately.
pub async fn fast() -> Json<&'static str> {
    Json("hello")
}

/// Panics after [`FAILING_HANDLER_DELAY`].
pub async fn panicking() -> &'static str {
    tokio::time::sleep(FAILING_HANDLER_DELAY).await;
    panic!("handler failed while processing the request")
}

/// Stops working as soon as its deadline is cancelled.
pub async fn cooperative(
    Extension(deadline): Extension<RequestDeadline>,
) -> Result<&'static str, StatusCode> {
    tokio::select! {
        _ = tokio::time::sleep(SLOW_HANDLER_DELAY) => Ok("done"),
        _ = deadline.cancelled() => {
            tracing::debug!("Deadline cancelled, abandoning work");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Liveness probe, not subject to the timeout.
pub async fn health() -> &'static str {
    "ok"
}
