//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! timeout::coordinator
//!     → logging.rs (debug events per outcome, subscriber set up by the binary)
//!     → metrics.rs (outcome counter, race duration histogram)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Handler failures are never logged here; they are re-raised to outer layers
//! - Metric updates are cheap enough to run on every request

pub mod logging;
pub mod metrics;
