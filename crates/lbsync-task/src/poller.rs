//! Bounded exponential backoff over a provisioning status.
//!
//! The provider builds load balancers asynchronously. [`wait_for_provisioning`]
//! fetches the status until it is terminal or the [`Backoff`] budget runs out.
//! Nothing in the reconciliation pass calls it; the caller decides whether a
//! pass should block until the load balancer is `ACTIVE`.

use std::future::Future;
use std::time::Duration;

use lbsync_cloud::{Cloud, CloudError};
use lbsync_core::LoadBalancerId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TaskError};

/// Delay before the second status fetch.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Multiplier applied to the delay after each fetch.
pub const DEFAULT_FACTOR: f64 = 1.2;

/// Maximum number of status fetches.
pub const DEFAULT_STEPS: u32 = 22;

/// Backoff schedule for status polling.
///
/// `steps` bounds the number of fetches; the delay between fetch `k` and
/// `k + 1` is `initial_delay * factor^(k - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// Delay before the second fetch, in milliseconds.
    #[serde(default = "Backoff::default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth factor per step. Values below 1 are treated as 1.
    #[serde(default = "Backoff::default_factor")]
    pub factor: f64,

    /// Maximum number of fetches.
    #[serde(default = "Backoff::default_steps")]
    pub steps: u32,
}

impl Backoff {
    #[allow(clippy::cast_possible_truncation)]
    const fn default_initial_delay_ms() -> u64 {
        DEFAULT_INITIAL_DELAY.as_millis() as u64
    }

    const fn default_factor() -> f64 {
        DEFAULT_FACTOR
    }

    const fn default_steps() -> u32 {
        DEFAULT_STEPS
    }

    /// Create a schedule.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(initial_delay: Duration, factor: f64, steps: u32) -> Self {
        Self {
            initial_delay_ms: initial_delay.as_millis() as u64,
            factor,
            steps,
        }
    }

    /// Load the schedule from environment variables, falling back to the defaults.
    ///
    /// Supported environment variables:
    /// - `LBSYNC_BACKOFF_INITIAL_MS`: Delay before the second fetch
    /// - `LBSYNC_BACKOFF_FACTOR`: Growth factor per step
    /// - `LBSYNC_BACKOFF_STEPS`: Maximum number of fetches
    #[must_use]
    pub fn from_env() -> Self {
        let mut backoff = Self::default();

        if let Ok(val) = std::env::var("LBSYNC_BACKOFF_INITIAL_MS") {
            if let Ok(n) = val.parse() {
                backoff.initial_delay_ms = n;
            }
        }
        if let Ok(val) = std::env::var("LBSYNC_BACKOFF_FACTOR") {
            if let Ok(n) = val.parse() {
                backoff.factor = n;
            }
        }
        if let Ok(val) = std::env::var("LBSYNC_BACKOFF_STEPS") {
            if let Ok(n) = val.parse() {
                backoff.steps = n;
            }
        }

        backoff
    }

    /// Delay before the second fetch.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// The sleeps between consecutive fetches, `steps - 1` of them.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let factor = if self.factor.is_finite() && self.factor >= 1.0 {
            self.factor
        } else {
            1.0
        };
        let initial = self.initial_delay();
        let mut next = initial.as_secs_f64();
        (1..self.steps).map(move |_| {
            let delay = Duration::try_from_secs_f64(next).unwrap_or(Duration::MAX);
            next *= factor;
            delay
        })
    }

    /// Upper bound on the time spent sleeping.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        self.delays()
            .fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_DELAY, DEFAULT_FACTOR, DEFAULT_STEPS)
    }
}

/// A provisioning status as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningStatus {
    /// Provisioning finished.
    Active,
    /// Provisioning failed.
    Error,
    /// Anything else, kept verbatim.
    InProgress(String),
}

impl ProvisioningStatus {
    /// Parse the provider's status string.
    #[must_use]
    pub fn from_provider(status: &str) -> Self {
        match status {
            "ACTIVE" => Self::Active,
            "ERROR" => Self::Error,
            other => Self::InProgress(other.to_string()),
        }
    }

    /// The provider's spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "ACTIVE",
            Self::Error => "ERROR",
            Self::InProgress(status) => status,
        }
    }

    /// Returns true if polling should stop.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Error)
    }
}

/// Result of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaitReport {
    /// Number of status fetches performed.
    pub attempts: u32,
}

/// Fetch a status until it is `ACTIVE`, `ERROR`, or the budget is spent.
///
/// A fetch error ends the wait at once. There is no cancellation hook; drop
/// the future to stop waiting.
///
/// # Errors
///
/// - `TaskError::RemoteApi` if a fetch fails
/// - `TaskError::ProvisioningFailed` if the status is `ERROR`
/// - `TaskError::ProvisioningTimeout` if `backoff.steps` fetches see no
///   terminal status
pub async fn wait_for_provisioning<F, Fut>(
    key: &str,
    backoff: &Backoff,
    mut fetch: F,
) -> Result<WaitReport>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<String, CloudError>>,
{
    info!(key = %key, steps = backoff.steps, "Waiting for load balancer to be ACTIVE");

    let mut delays = backoff.delays();
    let mut last_status = None;

    for attempt in 1..=backoff.steps {
        let raw = fetch()
            .await
            .map_err(|e| TaskError::remote("get provisioning status", key, e))?;

        match ProvisioningStatus::from_provider(&raw) {
            ProvisioningStatus::Active => {
                info!(key = %key, attempts = attempt, "Load balancer is ACTIVE");
                return Ok(WaitReport { attempts: attempt });
            }
            status if status.is_terminal() => {
                return Err(TaskError::ProvisioningFailed {
                    key: key.to_string(),
                    status: raw,
                });
            }
            _ => {
                debug!(key = %key, attempt, status = %raw, "Load balancer still provisioning");
                last_status = Some(raw);
            }
        }

        if let Some(delay) = delays.next() {
            tokio::time::sleep(delay).await;
        }
    }

    Err(TaskError::ProvisioningTimeout {
        key: key.to_string(),
        attempts: backoff.steps,
        last_status,
    })
}

/// Wait for a load balancer to reach `ACTIVE` provisioning status.
///
/// # Errors
///
/// See [`wait_for_provisioning`].
pub async fn wait_load_balancer_active<C: Cloud + ?Sized>(
    cloud: &C,
    id: &LoadBalancerId,
    backoff: &Backoff,
) -> Result<WaitReport> {
    wait_for_provisioning(id.as_str(), backoff, || async move {
        cloud
            .get_load_balancer(id)
            .await
            .map(|lb| lb.provisioning_status)
    })
    .await
}
