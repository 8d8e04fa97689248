// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Retry Executor - bounded retries with (optionally exponential) backoff
//
// Used by the CLI and `Orchestrator::submit_with_retry` to re-run task
// submissions whose textual result signals an error.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::config::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
            backoff_multiplier: 2.0,
            exponential: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        if !self.exponential {
            return self.initial_delay.min(self.max_delay);
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = nanos.min(self.max_delay.as_nanos() as f64);
        Duration::from_nanos(capped.round() as u64)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            backoff_multiplier: config.backoff_multiplier,
            exponential: config.exponential,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_attempts: usize,
    pub successful_attempts: usize,
    pub failed_attempts: usize,
}

#[derive(Debug, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    total_attempts: AtomicUsize,
    successful_attempts: AtomicUsize,
    failed_attempts: AtomicUsize,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until `should_retry` rejects its result or attempts
    /// run out. The last result is returned either way.
    ///
    /// At least one attempt is always made.
    pub async fn execute<T, F, Fut, P>(&self, mut operation: F, should_retry: P) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.total_attempts.fetch_add(1, Ordering::Relaxed);

            let result = operation().await;
            if !should_retry(&result) {
                self.successful_attempts.fetch_add(1, Ordering::Relaxed);
                debug!(attempt, "operation succeeded");
                return result;
            }

            self.failed_attempts.fetch_add(1, Ordering::Relaxed);
            if attempt >= max_attempts {
                warn!(attempts = attempt, "retries exhausted");
                return result;
            }

            let delay = self.policy.delay_after(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after delay");
            tokio::time::sleep(delay).await;
        }
    }

    /// Retry while `operation` returns `Err`.
    pub async fn execute_fallible<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute(operation, Result::is_err).await
    }

    pub fn stats(&self) -> RetryStats {
        RetryStats {
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            successful_attempts: self.successful_attempts.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert!(policy.exponential);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(10), Duration::from_secs(5));

        let linear = RetryPolicy {
            exponential: false,
            ..RetryPolicy::default()
        };
        assert_eq!(linear.delay_after(4), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let executor = RetryExecutor::new(fast_policy(3));
        let calls = AtomicUsize::new(0);

        let result = executor
            .execute(
                || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 1 { "Error: busy".to_string() } else { "done".to_string() }
                },
                |r: &String| r.contains("Error:"),
            )
            .await;

        assert_eq!(result, "done");
        assert_eq!(
            executor.stats(),
            RetryStats { total_attempts: 2, successful_attempts: 1, failed_attempts: 1 }
        );
    }

    #[tokio::test]
    async fn test_returns_last_result_when_exhausted() {
        let executor = RetryExecutor::new(fast_policy(3));

        let result = executor
            .execute(|| async { "Error: down".to_string() }, |r: &String| r.contains("Error:"))
            .await;

        assert_eq!(result, "Error: down");
        assert_eq!(executor.stats().total_attempts, 3);
        assert_eq!(executor.stats().failed_attempts, 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let executor = RetryExecutor::new(fast_policy(0));
        let result: Result<u8, &str> = executor.execute_fallible(|| async { Err("nope") }).await;

        assert_eq!(result, Err("nope"));
        assert_eq!(executor.stats().total_attempts, 1);
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig::default();
        assert_eq!(RetryPolicy::from(&config), RetryPolicy::default());
    }
}
