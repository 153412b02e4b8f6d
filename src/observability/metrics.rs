//! Metrics collection and exposition.
//!
//! # Metrics
//! - `request_deadline_outcomes_total` (counter): races by outcome
//! - `request_deadline_duration_seconds` (histogram): time until the race resolved

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one resolved race.
pub fn record_outcome(outcome: &'static str, start: Instant) {
    ::metrics::counter!("request_deadline_outcomes_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("request_deadline_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}
