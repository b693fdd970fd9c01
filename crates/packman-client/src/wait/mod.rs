//! Service availability polling.
//!
//! Installing a package can restart bundles or the whole package manager.
//! [`wait_for_service`] repeatedly probes the service with an increasing
//! delay until it answers as live, the deadline passes, or the probe reports
//! a terminal failure.
//!
//! The wait is an ordinary future: dropping it (for example from a
//! `tokio::select!` against a shutdown signal) cancels the pending sleep
//! immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use packman_core::error::{PackmanError, PackmanResult};

/// Outcome of a single availability probe that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The service answered the way a live package manager does
    Ready,
    /// The service is not ready yet; probe again
    Unready,
}

/// Backoff configuration for service waits
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay added per unsuccessful attempt
    pub step: Duration,
    /// Attempt count at which the delay stops growing
    pub max_steps: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(1),
            max_steps: 5,
        }
    }
}

impl WaitConfig {
    /// Delay before the probe following `attempts` unsuccessful probes.
    ///
    /// The first probe is preceded by a zero-length sleep.
    pub fn backoff(&self, attempts: u32) -> Duration {
        self.step * attempts.min(self.max_steps)
    }
}

/// Wait until `probe` reports [`Availability::Ready`].
///
/// `timeout` of `None` waits indefinitely. The probe receives whether a
/// deadline is enforced and the time remaining until it. An `Err` from the
/// probe is returned immediately without further attempts.
///
/// # Errors
///
/// Returns `ServiceTimeout` once the deadline has passed before a probe, or
/// the probe's own error.
pub async fn wait_for_service<F, Fut>(
    timeout: Option<Duration>,
    config: &WaitConfig,
    mut probe: F,
) -> PackmanResult<()>
where
    F: FnMut(bool, Duration) -> Fut,
    Fut: Future<Output = PackmanResult<Availability>>,
{
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut attempts = 0u32;

    loop {
        if let Some(deadline) = deadline {
            if deadline <= Instant::now() {
                return Err(PackmanError::ServiceTimeout {
                    message: format!("service not available after {} attempts", attempts),
                });
            }
        }

        tokio::time::sleep(config.backoff(attempts)).await;

        let remaining = deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO);

        match probe(deadline.is_some(), remaining).await? {
            Availability::Ready => {
                info!("Service available after {} attempts", attempts + 1);
                return Ok(());
            }
            Availability::Unready => {
                attempts += 1;
                debug!("Service not ready (attempt {})", attempts);
            }
        }
    }
}
