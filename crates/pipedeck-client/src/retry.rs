//! Bounded retry with exponential backoff for read fetches.
//!
//! Only failures that classify as retryable are retried. Mutating calls
//! (cancel, rerun, trigger) must not go through here.

use std::future::Future;
use std::time::Duration;

use crate::error::ClassifiedError;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Retry configuration for read fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves as one.
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    /// Delay after the `failed_attempt`-th failure (1-based).
    ///
    /// Doubles from `initial_backoff`, is raised to a server `retry_after`
    /// hint when one is present, and never exceeds `max_backoff`.
    pub fn backoff_for(&self, failed_attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        let mut delay = self.initial_backoff.saturating_mul(1u32 << exponent);
        if let Some(hint) = retry_after {
            delay = delay.max(hint);
        }
        delay.min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails non-retryably, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ClassifiedError>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err: ClassifiedError = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err.into(),
            };

            if !err.retryable {
                tracing::debug!(
                    event = "client.retry.gave_up",
                    attempt,
                    kind = %err.kind,
                    reason = "non_retryable",
                );
                return Err(err);
            }
            if attempt >= attempts {
                tracing::debug!(
                    event = "client.retry.gave_up",
                    attempt,
                    kind = %err.kind,
                    reason = "attempts_exhausted",
                );
                return Err(err);
            }

            let delay = self.backoff_for(attempt, err.retry_after);
            tracing::debug!(
                event = "client.retry.backoff",
                attempt,
                delay_ms = delay.as_millis() as u64,
                kind = %err.kind,
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Invoke `op` up to `attempts` times with the default backoff.
pub async fn retry_with_backoff<T, E, F, Fut>(attempts: u32, op: F) -> Result<T, ClassifiedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<ClassifiedError>,
{
    RetryPolicy::with_attempts(attempts).run(op).await
}
