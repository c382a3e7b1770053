// ABOUTME: Waiting and retry primitives for slow asynchronous state changes
// ABOUTME: Backoff polling for RDS instance states and a fixed-interval retry budget

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay before the second check
    pub initial_delay: Duration,
    /// Cap for exponential growth between checks
    pub max_delay: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl WaitConfig {
    /// RDS create/restore/delete routinely takes 5-20 minutes.
    pub fn for_rds_instance() -> Self {
        Self {
            initial_delay: Duration::from_secs(15),
            max_delay: Duration::from_secs(30),
            timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// What to do when a [`RetryPolicy`] runs out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Surface a timeout error.
    Fail,
    /// Log a warning and carry on as if the wait had succeeded.
    Proceed,
}

/// Fixed-interval retry budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub on_exhausted: Exhaustion,
}

impl RetryPolicy {
    /// Master password changes on a fresh restore land some minutes after the
    /// instance reports available.
    pub fn for_credential_change() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(45),
            on_exhausted: Exhaustion::Fail,
        }
    }
}

/// Run `check` until it returns `Ok(true)`.
///
/// `Ok(false)` means "not yet" and schedules another check after the next
/// backoff delay. An `Err` from `check` aborts the wait immediately, and so
/// does cancelling `cancel`.
pub async fn wait_for_resource<F, Fut>(
    config: &WaitConfig,
    cancel: Option<&CancellationToken>,
    check: F,
    resource_name: &str,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .with_jitter()
        .build();

    loop {
        attempts += 1;

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            anyhow::bail!("Wait for {} cancelled", resource_name);
        }

        match check().await {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(resource = %resource_name, error = ?e, "Resource check failed");
                return Err(e);
            }
        }

        if start.elapsed() >= config.timeout {
            anyhow::bail!(
                "Timeout waiting for {} after {:?} ({} attempts)",
                resource_name,
                config.timeout,
                attempts
            );
        }

        let delay = delays.next().unwrap_or(config.max_delay);
        debug!(
            resource = %resource_name,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Resource not ready, retrying"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            } => anyhow::bail!("Wait for {} cancelled", resource_name),
        }
    }
}
