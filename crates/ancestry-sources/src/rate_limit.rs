//! A minimal per-source rate limiter (§5: "per-source rate limits are
//! enforced inside adapters"). Spaces out requests so a configured
//! requests-per-second ceiling is never exceeded; callers simply await
//! [`RateLimiter::wait`] before issuing a request.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_sec: f64) -> Self {
        let per_sec = requests_per_sec.max(0.01);
        Self {
            min_interval: Duration::from_secs_f64(1.0 / per_sec),
            last_call: Mutex::new(None),
        }
    }

    /// Sleep, if necessary, until `min_interval` has elapsed since the
    /// previous call, then record this call as the new high-water mark.
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spaces_out_consecutive_calls() {
        let limiter = RateLimiter::new(20.0); // 50ms interval
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn first_call_never_waits() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
