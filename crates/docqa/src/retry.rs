//! Exponential backoff for remote calls
//!
//! `retry` drives an `attempt(n)` closure under a [`BackoffPolicy`]. Only errors
//! reporting [`Error::is_retryable`] are retried; the last error is returned once
//! the attempts run out.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Retry schedule: `delay(n) = min(initial_delay * 2^n, max_delay)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// Create a policy
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after failed attempt `attempt` (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(8))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_retries` retries have been spent.
///
/// `operation` receives the zero-based attempt number.
pub async fn retry<T, F, Fut>(policy: &BackoffPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt + 1,
                    policy.max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::debug!("{} gave up after {} attempts: {}", what, attempt + 1, e);
                }
                return Err(e);
            }
        }
    }
}

/// Convert an elapsed `tokio::time::timeout` into [`Error::Timeout`]
pub(crate) fn timed_out(what: &str) -> Error {
    Error::Timeout(what.to_string())
}
