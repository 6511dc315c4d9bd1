//! Retry utilities for store and notifier I/O
//!
//! Scan probes are never retried inline (a failed probe is re-driven by the
//! next round instead). This helper only covers the auxiliary calls around
//! the scan: token uploads and notifier deliveries.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how patiently an auxiliary call is repeated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Extra attempts after the first one
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each further one
    pub base_delay_ms: u64,

    /// Upper bound on any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Default delays with a custom retry count
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Fully specified retry policy
    pub fn with_delays(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Total attempts including the first
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_before(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64.checked_shl(retry - 1).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// the attempts run out
///
/// `what` names the call in log lines.
///
/// # Example
///
/// ```no_run
/// use vidscan::utils::retry::{with_retry_if, RetryConfig};
/// use vidscan::utils::error::StoreError;
///
/// async fn upload() -> Result<(), StoreError> {
///     Ok(())
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), StoreError> {
///     let config = RetryConfig::new(2);
///     with_retry_if(&config, "token upload", || upload(), StoreError::is_transient).await
/// }
/// ```
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    what: &str,
    operation: F,
    should_retry: P,
) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let attempts = config.attempts();
    let mut retry = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if retry > 0 {
                    debug!(operation = what, retry, "Succeeded on retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !should_retry(&error) {
            warn!(operation = what, error = %error, "Permanent failure, not retrying");
            return Err(error);
        }
        if retry + 1 >= attempts {
            warn!(operation = what, attempts, error = %error, "Giving up after retries");
            return Err(error);
        }

        retry += 1;
        let delay = config.delay_before(retry);
        warn!(
            operation = what,
            retry,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
