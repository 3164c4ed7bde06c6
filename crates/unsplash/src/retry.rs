//! Bounded exponential-backoff retry for outbound calls.
//!
//! [`retry`] runs an operation up to [`RetryPolicy::max_attempts`] times,
//! sleeping with a growing delay between attempts, and only retries errors
//! that report themselves as [`Transient`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classifies errors into retryable and terminal.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Tunable parameters for the retry strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and policy.
///
/// The result is clamped to [`RetryPolicy::max_delay`].
pub fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier) as u64;
    Duration::from_millis(next_ms).min(policy.max_delay)
}

/// Run `operation` until it succeeds, fails terminally, or the attempt
/// budget is spent.
///
/// `operation` receives the 1-based attempt number. The last error is
/// returned when attempts run out.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: Transient + Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay.min(policy.max_delay);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Outbound call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying",
                );
                tokio::time::sleep(delay).await;
                delay = next_delay(delay, policy);
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!(attempt, error = %e, "Retries exhausted");
                } else {
                    tracing::warn!(attempt, error = %e, "Non-transient failure, not retrying");
                }
                return Err(e);
            }
        }
    }
}
