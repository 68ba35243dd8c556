//! Bounded retry with capped exponential backoff.
//!
//! An explicit loop rather than recursive re-invocation keeps stack depth
//! flat and makes the worst-case added latency easy to read off the
//! config: at most `max_attempts - 1` sleeps, each capped at
//! `max_delay_ms`.

use super::StoreError;
use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter: false,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before retry number `retry` (1-based): base doubled per
    /// retry, capped, plus up to 25% random jitter when enabled.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let computed = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        if self.jitter && computed > Duration::ZERO {
            let spread = (computed.as_millis() as u64 / 4).max(1);
            computed + Duration::from_millis(rand::thread_rng().gen_range(0..spread))
        } else {
            computed
        }
    }

    /// Drive `attempt_fn` until it succeeds or the budget is spent, then
    /// surface the last failure as `StoreError::Unavailable`.
    pub async fn run<T, E, F, Fut>(&self, op: &'static str, mut attempt_fn: F) -> Result<T, StoreError>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(op, attempts = attempt, error = %e, "store operation failed, retry budget spent");
                        return Err(StoreError::Unavailable {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    let delay = self.delay_for(attempt);
                    debug!(op, attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying store operation");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(4),
        )
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_millis(100),
            Duration::from_millis(2_000),
        );
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(6), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(60), Duration::from_millis(2_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::new(
            3,
            Duration::from_millis(100),
            Duration::from_millis(2_000),
        )
        .with_jitter();
        for _ in 0..100 {
            let d = policy.delay_for(1);
            assert!(d >= Duration::from_millis(100));
            assert!(d < Duration::from_millis(126));
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_exact_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), StoreError> = fast_policy(3)
            .run("TEST", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), &str>("connection refused") }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(StoreError::Unavailable { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recovers_on_late_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("TEST", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_success_needs_no_sleep() {
        let result = fast_policy(1)
            .run("TEST", || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
    }
}
