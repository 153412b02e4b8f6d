//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::Deserialize;

use crate::timeout::policy::{
    PolicyError, TimeoutPolicy, DEFAULT_DEADLINE, DEFAULT_TIMEOUT_BODY, DEFAULT_TIMEOUT_STATUS,
};

/// Root configuration for the demo server.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Timeout policy applied to guarded routes.
    pub timeout: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout policy as written in the config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Handler deadline in milliseconds.
    pub deadline_ms: u64,

    /// Status code of the timeout response.
    pub status: u16,

    /// Body of the timeout response.
    pub body: String,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE.as_millis() as u64,
            status: DEFAULT_TIMEOUT_STATUS.as_u16(),
            body: DEFAULT_TIMEOUT_BODY.to_string(),
        }
    }
}

impl TimeoutConfig {
    /// Build the runtime policy.
    pub fn to_policy(&self) -> Result<TimeoutPolicy, PolicyError> {
        TimeoutPolicy::builder()
            .deadline(Duration::from_millis(self.deadline_ms))
            .timeout_status_code(self.status)
            .timeout_body(self.body.clone())
            .build()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
