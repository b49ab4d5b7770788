//! Per-provider minimum-interval throttle.
//!
//! One limiter exists per provider and is shared by every caller of that
//! provider. The timestamp lock is held across the wait, so concurrent callers
//! pass through one at a time in arrival order.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    provider_id: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(provider_id: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            provider_id: provider_id.into(),
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the provider's interval has elapsed, then record this request.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!(
                    provider = %self.provider_id,
                    wait_ms = remaining.as_millis() as u64,
                    "Rate limit wait"
                );
                tokio::time::sleep(remaining).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new("semanticscholar", Duration::from_millis(1000));
        let mut stamps = Vec::new();
        for _ in 0..4 {
            limiter.wait().await;
            stamps.push(Instant::now());
        }
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_does_not_wait() {
        let limiter = RateLimiter::new("gscholar", Duration::from_millis(2000));
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_remaining_interval_is_waited() {
        let limiter = RateLimiter::new("crossref", Duration::from_millis(1000));
        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(700)).await;
        let before = Instant::now();
        limiter.wait().await;
        assert_eq!(Instant::now() - before, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_serialize() {
        let limiter = Arc::new(RateLimiter::new("opencitations", Duration::from_millis(1000)));
        let tasks = (0..3).map(|_| {
            let limiter = Arc::clone(&limiter);
            async move {
                limiter.wait().await;
                Instant::now()
            }
        });
        let mut stamps = join_all(tasks).await;
        stamps.sort();
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1000));
        }
    }
}
