//! Retry-with-backoff helper for flaky external calls (requires `http` feature).
//!
//! Generalizes the manual retry loop used by package-downloading code in this
//! workspace's history into a reusable helper: callers supply an async
//! closure, a retry budget, and a base delay; transient failures are retried
//! with a linearly increasing backoff and the last error is returned once the
//! budget is exhausted.

use std::time::Duration;

/// Configuration for a retry-with-backoff run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay; attempt `n` (1-indexed) waits `base_delay * n` before retrying.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping between attempts.
///
/// `is_retryable` decides whether a given error should be retried at all;
/// non-retryable errors return immediately. Returns the last error once the
/// attempt budget is exhausted.
pub async fn with_backoff<T, E, F, Fut, R>(
    policy: RetryPolicy,
    mut op: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                tracing::warn!(attempt, "retrying after transient failure");
                tokio::time::sleep(policy.base_delay * attempt).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(
            RetryPolicy::new(3, Duration::from_millis(1)),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7u32) }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(
            RetryPolicy::new(5, Duration::from_millis(1)),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42u32)
                    }
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(
            RetryPolicy::new(2, Duration::from_millis(1)),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("permanent") }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(
            RetryPolicy::new(5, Duration::from_millis(1)),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
            |_| false,
        )
        .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
