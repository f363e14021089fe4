//! Bounded exponential backoff
//!
//! After attempt `k` (1-indexed) fails with a transient error the executor
//! sleeps `base_delay * 2^(k-1)`. With the default 2s base that is 2s, 4s, 8s
//! and so on, up to `max_retries` total attempts. The sleep suspends only the
//! calling task.
//!
//! An optional deadline bounds the whole run, backoff included. When it
//! elapses the in-flight attempt is dropped, which cancels its HTTP request.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{RetryError, Retryable};

/// Runs a fallible async operation with retries
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_retries: u32,
    base_delay: Duration,
    deadline: Option<Duration>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryExecutor {
    /// `max_retries` total attempts, without a deadline.
    ///
    /// Zero is treated as one attempt.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
            deadline: None,
        }
    }

    /// Executor for the configured attempts, backoff and deadline
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.base_delay).with_deadline(config.deadline)
    }

    /// Bound the whole run, backoff included
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Total attempts
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Wait after attempt `attempt` (1-indexed) fails
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails permanently, runs out of
    /// attempts or hits the deadline.
    ///
    /// The closure receives the 1-indexed attempt number.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut last = None;
        let Some(deadline) = self.deadline else {
            return self.run(operation, &mut last).await;
        };

        let outcome = tokio::time::timeout(deadline, self.run(operation, &mut last)).await;
        outcome.unwrap_or_else(|_| {
            warn!(deadline_ms = deadline.as_millis() as u64, "Retry deadline elapsed");
            Err(RetryError::TimedOut { deadline, last })
        })
    }

    /// `last` holds the most recent transient failure so a timed-out run can
    /// still report it
    async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        last: &mut Option<E>,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    debug!(attempt, error = %e, "Operation failed permanently");
                    return Err(RetryError::Permanent(e));
                }
                Err(e) if attempt >= self.max_retries => {
                    warn!(attempts = attempt, error = %e, "Retries exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    *last = Some(e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(10),
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_delay_doubles() {
        let executor = RetryExecutor::new(5, Duration::from_secs(2));
        assert_eq!(executor.delay_after(1), Duration::from_secs(2));
        assert_eq!(executor.delay_after(2), Duration::from_secs(4));
        assert_eq!(executor.delay_after(3), Duration::from_secs(8));
        assert_eq!(executor.delay_after(40), Duration::from_secs(2).saturating_mul(u32::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_waits_2s_then_4s() {
        let executor = RetryExecutor::new(3, Duration::from_secs(2));
        let start = Instant::now();
        let starts = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let recorded = starts.clone();
        let result: Result<(), _> = executor
            .execute(|attempt| {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().push(start.elapsed());
                    Err(ApiError::Transport(format!("connection refused #{}", attempt)))
                }
            })
            .await;

        let starts = starts.lock().clone();
        assert_eq!(starts.len(), 3);
        assert_close(starts[1] - starts[0], Duration::from_secs(2));
        assert_close(starts[2] - starts[1], Duration::from_secs(4));

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(
            err.to_string(),
            "Failed after 3 retries. Last error: Transport error: connection refused #3"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failure() {
        let executor = RetryExecutor::new(3, Duration::from_secs(2));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = executor
            .execute(|_| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ApiError::Timeout(30))
                    } else {
                        Ok("SUCCESS")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("SUCCESS"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let executor = RetryExecutor::new(3, Duration::from_secs(2));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = executor
            .execute(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ApiError::Api {
                        status: 404,
                        message: "Order not found".into(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Permanent(ApiError::Api { status: 404, .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_backoff_short() {
        let executor =
            RetryExecutor::new(10, Duration::from_secs(2)).with_deadline(Duration::from_secs(5));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = executor
            .execute(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ApiError::Transport("reset".into()))
                }
            })
            .await;

        // Attempts at t=0s and t=2s; the next would start at t=6s
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let err = result.unwrap_err();
        assert_eq!(
            err,
            RetryError::TimedOut {
                deadline: Duration::from_secs(5),
                last: Some(ApiError::Transport("reset".into())),
            }
        );
        assert_eq!(
            err.to_string(),
            "Operation timed out after 5s. Last error: Transport error: reset"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_before_any_failure_has_no_last_error() {
        let executor =
            RetryExecutor::new(3, Duration::from_secs(2)).with_deadline(Duration::from_secs(1));

        let result: Result<(), RetryError<ApiError>> = executor
            .execute(|_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.last_error().is_none());
        assert_eq!(err.to_string(), "Operation timed out after 1s");
    }
}
