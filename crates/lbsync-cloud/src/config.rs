//! Provider endpoint configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{CloudError, Result};

/// Configuration for talking to the load-balancing and networking services.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the load-balancing service (Octavia).
    #[serde(default = "CloudConfig::default_load_balancer_endpoint")]
    pub load_balancer_endpoint: String,

    /// Base URL of the networking service (Neutron).
    #[serde(default = "CloudConfig::default_network_endpoint")]
    pub network_endpoint: String,

    /// Token sent as `X-Auth-Token` on every request.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "CloudConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl CloudConfig {
    fn default_load_balancer_endpoint() -> String {
        "http://localhost:9876".to_string()
    }

    fn default_network_endpoint() -> String {
        "http://localhost:9696".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `OS_LOADBALANCER_ENDPOINT`: Base URL of the load-balancing service
    /// - `OS_NETWORK_ENDPOINT`: Base URL of the networking service
    /// - `OS_AUTH_TOKEN`: Pre-issued authentication token
    /// - `OS_REQUEST_TIMEOUT_SECONDS`: Per-request timeout
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("OS_LOADBALANCER_ENDPOINT") {
            config.load_balancer_endpoint = val;
        }
        if let Ok(val) = std::env::var("OS_NETWORK_ENDPOINT") {
            config.network_endpoint = val;
        }
        if let Ok(val) = std::env::var("OS_AUTH_TOKEN") {
            if !val.is_empty() {
                config.auth_token = Some(val);
            }
        }
        if let Ok(val) = std::env::var("OS_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.request_timeout_seconds = n;
            }
        }

        config
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint is empty or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.load_balancer_endpoint.trim().is_empty() {
            return Err(CloudError::Config(
                "load balancer endpoint must not be empty".to_string(),
            ));
        }
        if self.network_endpoint.trim().is_empty() {
            return Err(CloudError::Config(
                "network endpoint must not be empty".to_string(),
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(CloudError::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            load_balancer_endpoint: Self::default_load_balancer_endpoint(),
            network_endpoint: Self::default_network_endpoint(),
            auth_token: None,
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}
