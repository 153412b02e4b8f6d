//! Demo HTTP server around the timeout layer.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, TraceLayer, CatchPanicLayer)
//!     → timeout::TimeoutLayer on guarded routes
//!     → handlers.rs
//!     → Send to client
//! ```

pub mod handlers;
pub mod server;

pub use server::HttpServer;
