//! Retry policies with backoff for queued jobs and in-process calls.
//!
//! A [`RetryPolicy`] bounds how many times a job is attempted and how long to
//! wait between attempts. The queue worker consults it after each failure to
//! decide between releasing the job with a delay and dead-lettering it.
//!
//! Two backoff shapes are supported:
//!
//! - [`Backoff::Schedule`]: explicit per-attempt delays (the last one repeats)
//! - [`Backoff::Exponential`]: `initial · multiplier^(attempt-1)`, capped
//!
//! # Example
//!
//! ```rust
//! use product_reviews_runtime::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::recompute();
//! assert_eq!(policy.max_attempts, 3);
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(60));
//! assert!(policy.should_retry(2));
//! assert!(!policy.should_retry(3));
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// How long to wait before the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Fixed delays; attempt `n` waits `delays[n-1]`, the last entry repeats.
    Schedule(Vec<Duration>),
    /// Exponential growth from `initial`, capped at `max`.
    Exponential {
        /// Delay after the first failure
        initial: Duration,
        /// Upper bound
        max: Duration,
        /// Growth factor per attempt
        multiplier: f64,
    },
}

/// Retry policy: attempt budget plus backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `backoff`: exponential from 100ms, doubling, capped at 30 seconds
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay between attempts
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
        }
    }
}

impl RetryPolicy {
    /// Policy for statistics recompute jobs: 3 attempts, 60s / 180s / 300s.
    #[must_use]
    pub fn recompute() -> Self {
        Self::scheduled(3, &[60, 180, 300])
    }

    /// Policy for CDN invalidation jobs: 3 attempts, 30s / 60s / 120s.
    #[must_use]
    pub fn invalidation() -> Self {
        Self::scheduled(3, &[30, 60, 120])
    }

    /// Policy with explicit delays in seconds.
    #[must_use]
    pub fn scheduled(max_attempts: u32, delays_secs: &[u64]) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Schedule(delays_secs.iter().map(|s| Duration::from_secs(*s)).collect()),
        }
    }

    /// Whether a job that just failed its `attempt`-th try gets another one.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay after the `attempt`-th failure (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1);
        match &self.backoff {
            Backoff::Schedule(delays) => {
                let i = usize::try_from(index).unwrap_or(usize::MAX);
                delays
                    .get(i)
                    .or_else(|| delays.last())
                    .copied()
                    .unwrap_or_default()
            }
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                #[allow(clippy::cast_possible_wrap)] // attempt counts are tiny
                let factor = multiplier.powi(index.min(64) as i32);
                Duration::try_from_secs_f64(initial.as_secs_f64() * factor)
                    .map_or(*max, |delay| delay.min(*max))
            }
        }
    }
}

/// Retry an async operation in-process while `is_retryable` holds.
///
/// Used where no queue sits in between, such as a synchronous CDN
/// invalidation run from the operator CLI.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the
/// attempt budget is spent.
///
/// # Example
///
/// ```rust
/// use product_reviews_runtime::retry::{RetryPolicy, retry_with_predicate};
///
/// # async fn example() -> Result<(), String> {
/// let result = retry_with_predicate(
///     &RetryPolicy::default(),
///     || async { Ok::<_, String>(42) },
///     |err: &String| err.contains("transient"),
/// ).await?;
/// assert_eq!(result, 42);
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    tracing::warn!(error = %err, "Error is not retryable, failing immediately");
                    return Err(err);
                }

                if !policy.should_retry(attempt) {
                    tracing::error!(attempt, error = %err, "Operation failed after max attempts");
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Operation failed, retrying..."
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
