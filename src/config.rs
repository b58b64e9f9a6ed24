//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_refresh_threshold() -> Duration {
    Duration::from_secs(120)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Configuration for [`ChimeriaClient`](crate::ChimeriaClient)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `https://api.chimeria.example`
    pub base_url: String,
    /// Remaining token validity below which a renewal happens before the
    /// request goes out. The default of two minutes is a deliberate safety
    /// margin against clock skew and request latency.
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold: Duration,
    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the given backend with default timings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_threshold: default_refresh_threshold(),
            request_timeout: default_request_timeout(),
        }
    }

    /// Sets the proactive-renewal threshold
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Sets the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
