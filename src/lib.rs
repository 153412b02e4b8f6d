//! Per-request timeout enforcement for Tower and Axum services.
//!
//! A handler runs on its own task while the caller waits on a deadline. If the
//! handler finishes first its buffered response is sent; otherwise a configured
//! status and body are sent and the handler is left to finish on its own.

pub mod config;
pub mod http;
pub mod observability;
pub mod timeout;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use timeout::{
    DeadlineExceeded, RaceCoordinator, RequestDeadline, ResponseCapture, TimeoutLayer,
    TimeoutPolicy,
};
