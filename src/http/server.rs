//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Guard application routes with the timeout layer
//! - Wire up outer middleware (panic recovery, tracing)
//! - Serve on a listener until shutdown

use std::any::Any;
use std::future::Future;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::handlers;
use crate::timeout::{PolicyError, TimeoutLayer, TimeoutPolicy};

/// HTTP server for the demo routes.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self, PolicyError> {
        let policy = config.timeout.to_policy()?;
        let router = Self::build_router(policy);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Panics re-raised by the timeout layer are turned into 500 responses by
    /// `CatchPanicLayer`, carrying the panic message.
    pub fn build_router(policy: TimeoutPolicy) -> Router {
        let guarded = Router::new()
            .route("/hello", get(handlers::hello))
            .route("/fast", get(handlers::fast))
            .route("/panic", get(handlers::panicking))
            .route("/cooperative", get(handlers::cooperative))
            .route_layer(TimeoutLayer::new(policy));

        Router::new()
            .route("/health", get(handlers::health))
            .merge(guarded)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            deadline = ?self.config.timeout.deadline_ms,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Recovery response for a handler panic: 500 with the panic message as body.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %message, "Handler panicked");

    let mut response = Response::new(Body::from(format!("Service panicked: {message}")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_panic_response_keeps_message() {
        let response = panic_response(Box::new("worker died"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"Service panicked: worker died");

        let response = panic_response(Box::new(String::from("formatted 42")));
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"Service panicked: formatted 42");
    }
}
