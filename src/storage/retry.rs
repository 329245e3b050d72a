//! Retry with delay for transient platform failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::{DspaceError, Result};

/// How a failed operation is retried.
///
/// With `max_attempts == 0` the operation is retried until it succeeds,
/// which is the behaviour chunk transfers and logins default to.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    jitter: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    /// Retry forever with a fixed delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            jitter: Duration::ZERO,
            max_attempts: 0,
        }
    }

    /// Grow the delay by `multiplier` after each failure (values below 1.0 are clamped).
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Cap the delay between attempts.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay.max(self.initial_delay);
        self
    }

    /// Add up to `jitter` of random delay to each wait.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Give up after `max_attempts` attempts (0 = never give up).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Attempt ceiling (0 = unbounded).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after the `attempt`-th failure (1-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let scaled = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.round() as u64)
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.jitter.is_zero() {
            return base;
        }
        let extra = rand::rng().random_range(0..=self.jitter.as_millis() as u64);
        base + Duration::from_millis(extra)
    }

    /// Run `operation` until it succeeds or the attempt ceiling is reached.
    ///
    /// Every error is treated as transient; callers validate their input
    /// before entering the loop.
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if self.max_attempts != 0 && attempt >= self.max_attempts {
                warn!(operation = name, attempt, error = %error, "giving up");
                return Err(DspaceError::RetryExhausted {
                    operation: name.to_string(),
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }

            let delay = self.jittered(self.delay_for(attempt));
            warn!(
                operation = name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing_until(succeed_on: u32, calls: &AtomicU32) -> Result<u32> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= succeed_on {
            Ok(n)
        } else {
            Err(DspaceError::Platform(format!("attempt {n} failed")))
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(Duration::from_millis(1));

        let result = policy
            .run("op", || async { failing_until(1, &calls) })
            .await
            .unwrap();

        assert_eq!(result, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbounded_retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(Duration::from_millis(1));

        let result = policy
            .run("op", || async { failing_until(25, &calls) })
            .await
            .unwrap();

        assert_eq!(result, 25);
    }

    #[tokio::test]
    async fn test_bounded_retries_give_up() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(3);

        let err = policy
            .run("chunk upload", || async { failing_until(10, &calls) })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            DspaceError::RetryExhausted {
                operation,
                attempts,
                last_error,
            } => {
                assert_eq!(operation, "chunk upload");
                assert_eq!(attempts, 3);
                assert!(last_error.to_string().contains("attempt 3 failed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(Duration::from_millis(1000));
        let start = tokio::time::Instant::now();

        policy
            .run("op", || async { failing_until(4, &calls) })
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[test]
    fn test_delay_growth_and_cap() {
        let policy = RetryPolicy::fixed(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_millis(500));

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_fixed_policy_never_grows() {
        let policy = RetryPolicy::fixed(Duration::from_millis(250)).with_multiplier(0.1);
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(10), Duration::from_millis(250));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy =
            RetryPolicy::fixed(Duration::from_millis(100)).with_jitter(Duration::from_millis(20));
        for _ in 0..50 {
            let d = policy.jittered(policy.delay_for(1));
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(120));
        }
    }
}
