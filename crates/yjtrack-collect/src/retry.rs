//! Retry with exponential back-off, additive jitter, and a per-attempt
//! timeout race.
//!
//! Every collector error is treated as retriable — the sources this crate
//! talks to fail transiently far more often than permanently, and a run
//! that exhausts its attempts is recorded as failed rather than aborting
//! anything else.
//!
//! The timeout race only abandons the wait for an attempt's result. The
//! dropped future aborts its in-flight HTTP request, but the remote side
//! may still have processed it; callers must tolerate that imprecision.

use std::future::Future;
use std::time::Duration;

use crate::error::CollectError;

/// Back-off parameters for one task's retry loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Must be at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Ceiling applied after jitter.
    pub max_delay: Duration,
    /// Jitter is uniform in `[0, max_jitter]`, added to the exponential term.
    pub max_jitter: Duration,
    /// Hard ceiling on a single attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// The sleep before attempt `attempt` (2-based; there is no sleep before
    /// the first attempt): `min(base * 2^(attempt-2) + jitter, max_delay)`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32, jitter: Duration) -> Duration {
        let exponent = attempt.saturating_sub(2).min(20);
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let exp_ms = base_ms.saturating_mul(1u64 << exponent);
        let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
        let delay_ms = exp_ms.saturating_add(jitter_ms);
        let cap_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(delay_ms.min(cap_ms))
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jitter_ms = (max_ms as f64 * rand::random::<f64>()) as u64;
        Duration::from_millis(jitter_ms)
    }

    /// Runs `operation` until it succeeds or `max_attempts` are spent.
    ///
    /// Each attempt is raced against [`RetryPolicy::attempt_timeout`]; an
    /// elapsed timeout counts as a failed attempt.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::RetriesExhausted`] carrying the attempt count
    /// and the last attempt's error message.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, CollectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollectError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_err: Option<CollectError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.backoff_delay(attempt, self.sample_jitter());
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %last_err.as_ref().map_or_else(String::new, ToString::to_string),
                    "collection attempt failed — retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.attempt_timeout, operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => last_err = Some(err),
                Err(_elapsed) => {
                    last_err = Some(CollectError::AttemptTimeout {
                        secs: self.attempt_timeout.as_secs(),
                    });
                }
            }
        }

        Err(CollectError::RetriesExhausted {
            attempts: max_attempts,
            last: last_err.map_or_else(String::new, |e| e.to_string()),
        })
    }
}
