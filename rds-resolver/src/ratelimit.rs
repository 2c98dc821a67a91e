//! Token-bucket-style rate limiter (spec §4.17, §5, §8.9): no two remote
//! requests issued through one [`RateLimiter`] depart less than
//! `min_interval` apart.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Suspends the caller until the rate limit clears, then reserves the
    /// next slot. Only suspension point in this module (spec §5).
    pub async fn acquire(&self) {
        let wait = {
            let mut next_allowed = self.next_allowed.lock().unwrap();
            let now = Instant::now();
            let scheduled = next_allowed.map(|t| t.max(now)).unwrap_or(now);
            *next_allowed = Some(scheduled + self.min_interval);
            scheduled.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn enforces_minimum_interval_between_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(1100));
        let t0 = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        let elapsed = Instant::now().duration_since(t0);
        assert!(elapsed >= Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_wait_when_interval_already_elapsed() {
        let limiter = RateLimiter::new(Duration::from_millis(1100));
        limiter.acquire().await;
        tokio::time::advance(Duration::from_millis(1200)).await;
        let t0 = Instant::now();
        limiter.acquire().await;
        assert_eq!(Instant::now().duration_since(t0), Duration::ZERO);
    }
}
