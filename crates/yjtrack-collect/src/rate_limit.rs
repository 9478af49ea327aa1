//! Minimum-interval gate for outbound requests.
//!
//! `acquire()` blocks until at least `period / max_requests` has elapsed
//! since the previous acquisition. Waiters hold the gate's lock while they
//! sleep, so concurrent callers are spaced out one interval apart rather
//! than released together.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
    interval: Duration,
    last_acquired: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// A limiter allowing at most `max_requests` per `period`.
    #[must_use]
    pub fn new(max_requests: u32, period: Duration) -> Self {
        Self {
            interval: period / max_requests.max(1),
            last_acquired: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the minimum interval since the previous acquisition has
    /// passed, then records this acquisition.
    pub async fn acquire(&self) {
        let mut last = self.last_acquired.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_acquire_is_immediate() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_acquire_waits_the_interval() {
        let limiter = RateLimiter::new(10, Duration::from_millis(500));
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(
            start.elapsed() >= Duration::from_millis(50),
            "second acquire returned after {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn interval_divides_period_by_max_requests() {
        let limiter = RateLimiter::new(4, Duration::from_secs(60));
        assert_eq!(limiter.interval(), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn zero_max_requests_does_not_panic() {
        let limiter = RateLimiter::new(0, Duration::from_millis(10));
        limiter.acquire().await;
        limiter.acquire().await;
    }
}
