//! Timeout policy and its builder.

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;

/// Default time a handler is given before the timeout response is sent.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);

/// Default status code of the timeout response.
pub const DEFAULT_TIMEOUT_STATUS: StatusCode = StatusCode::SERVICE_UNAVAILABLE;

/// Default body of the timeout response.
pub const DEFAULT_TIMEOUT_BODY: &str =
    "<html><head><title>Timeout</title></head><body><h1>Timeout</h1></body></html>";

/// Error type for policy construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    /// A zero deadline would time out every request before its handler runs.
    #[error("deadline must be greater than zero")]
    ZeroDeadline,
    /// The raw status code is outside 100..=999.
    #[error("invalid timeout status code: {0}")]
    InvalidStatus(u16),
}

/// Immutable timeout configuration shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutPolicy {
    deadline: Duration,
    timeout_status: StatusCode,
    timeout_body: Bytes,
}

impl TimeoutPolicy {
    /// Start building a policy from the defaults.
    pub fn builder() -> TimeoutPolicyBuilder {
        TimeoutPolicyBuilder::default()
    }

    /// How long the handler may run.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Status written on timeout.
    pub fn timeout_status(&self) -> StatusCode {
        self.timeout_status
    }

    /// Body written on timeout.
    pub fn timeout_body(&self) -> &Bytes {
        &self.timeout_body
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            timeout_status: DEFAULT_TIMEOUT_STATUS,
            timeout_body: Bytes::from_static(DEFAULT_TIMEOUT_BODY.as_bytes()),
        }
    }
}

/// Builder for [`TimeoutPolicy`]. Each option sets one field; unset fields keep
/// their defaults.
#[derive(Debug, Clone, Default)]
pub struct TimeoutPolicyBuilder {
    deadline: Option<Duration>,
    timeout_status: Option<StatusCode>,
    invalid_status: Option<u16>,
    timeout_body: Option<Bytes>,
}

impl TimeoutPolicyBuilder {
    /// Override the default 3 second deadline.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Override the default 503 timeout status.
    pub fn timeout_status(mut self, status: StatusCode) -> Self {
        self.timeout_status = Some(status);
        self.invalid_status = None;
        self
    }

    /// Same as [`timeout_status`](Self::timeout_status) for a raw code, checked on build.
    pub fn timeout_status_code(mut self, code: u16) -> Self {
        match StatusCode::from_u16(code) {
            Ok(status) => {
                self.timeout_status = Some(status);
                self.invalid_status = None;
            }
            Err(_) => self.invalid_status = Some(code),
        }
        self
    }

    /// Override the default HTML timeout page.
    pub fn timeout_body(mut self, body: impl Into<Bytes>) -> Self {
        self.timeout_body = Some(body.into());
        self
    }

    /// Produce the immutable policy.
    pub fn build(self) -> Result<TimeoutPolicy, PolicyError> {
        if let Some(code) = self.invalid_status {
            return Err(PolicyError::InvalidStatus(code));
        }

        let defaults = TimeoutPolicy::default();
        let deadline = self.deadline.unwrap_or(defaults.deadline);
        if deadline.is_zero() {
            return Err(PolicyError::ZeroDeadline);
        }

        Ok(TimeoutPolicy {
            deadline,
            timeout_status: self.timeout_status.unwrap_or(defaults.timeout_status),
            timeout_body: self.timeout_body.unwrap_or(defaults.timeout_body),
        })
    }
}
