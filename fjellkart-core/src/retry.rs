//! Bounded retry with linear backoff for rate-limited source calls.
//!
//! Only an explicit rate-limit signal is retried. Every other failure ends
//! the loop immediately and is reported in the [`RetryOutcome`] instead of
//! being propagated, so one failing category never aborts a pass.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::{RawRecord, SourceError};

/// Shortest per-attempt timeout a caller may configure.
pub const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(8);
/// Longest per-attempt timeout a caller may configure.
pub const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(12);

/// Async sleep used between retries.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Attempt limits and backoff schedule.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use fjellkart_core::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.backoff_delay(0), Duration::from_secs(10));
/// assert_eq!(policy.backoff_delay(1), Duration::from_secs(15));
/// assert_eq!(policy.backoff_delay(9), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    attempt_timeout: Duration,
    base_delay: Duration,
    delay_step: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            base_delay: Duration::from_secs(10),
            delay_step: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total number of attempts, including the first. Zero is
    /// treated as one.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the per-attempt timeout, clamped to
    /// [`MIN_ATTEMPT_TIMEOUT`]..=[`MAX_ATTEMPT_TIMEOUT`].
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout.clamp(MIN_ATTEMPT_TIMEOUT, MAX_ATTEMPT_TIMEOUT);
        self
    }

    /// Set the base delay, per-retry step and cap of the backoff schedule.
    #[must_use]
    pub const fn with_backoff(mut self, base: Duration, step: Duration, cap: Duration) -> Self {
        self.base_delay = base;
        self.delay_step = step;
        self.max_delay = cap;
        self
    }

    /// Total attempts allowed.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Timeout applied to each attempt.
    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Delay before retry number `retry_index`, counting from zero.
    #[must_use]
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        self.base_delay
            .saturating_add(self.delay_step.saturating_mul(retry_index))
            .min(self.max_delay)
    }
}

/// Result of running one query through the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    /// Records from the successful attempt, empty on failure.
    pub records: Vec<RawRecord>,
    /// Attempts actually made.
    pub attempts: u32,
    /// The last error when no attempt succeeded.
    pub error: Option<SourceError>,
}

impl RetryOutcome {
    fn succeeded(records: Vec<RawRecord>, attempts: u32) -> Self {
        Self {
            records,
            attempts,
            error: None,
        }
    }

    const fn failed(error: SourceError, attempts: u32) -> Self {
        Self {
            records: Vec::new(),
            attempts,
            error: Some(error),
        }
    }

    /// Whether an attempt succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs source calls under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), Arc::new(TokioSleeper))
    }
}

impl std::fmt::Debug for RetryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryController")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryController {
    /// Create a controller sleeping through `sleeper`.
    #[must_use]
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Policy in force.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it succeeds, fails without a rate limit, runs out of
    /// attempts, or `cancel` fires.
    ///
    /// `call` receives the 1-based attempt number. Each attempt races the
    /// call against the attempt timeout and the cancellation token.
    ///
    /// # Examples
    /// ```
    /// # tokio::runtime::Builder::new_current_thread().enable_time().build()?.block_on(async {
    /// use fjellkart_core::{RetryController, SourceError};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// let controller = RetryController::default();
    /// let outcome = controller
    ///     .execute("demo", &CancellationToken::new(), |_| async {
    ///         Err(SourceError::Service { status: 503, message: String::new() })
    ///     })
    ///     .await;
    /// assert_eq!(outcome.attempts, 1);
    /// assert!(outcome.records.is_empty());
    /// # });
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub async fn execute<F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> RetryOutcome
    where
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = Result<Vec<RawRecord>, SourceError>> + Send,
    {
        if cancel.is_cancelled() {
            return RetryOutcome::failed(SourceError::Cancelled, 0);
        }
        let timeout = self.policy.attempt_timeout;
        let mut attempt = 0_u32;
        loop {
            attempt = attempt.saturating_add(1);
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(SourceError::Cancelled),
                timed = tokio::time::timeout(timeout, call(attempt)) => {
                    timed.unwrap_or_else(|_| {
                        Err(SourceError::Timeout {
                            message: format!("no response within {}s", timeout.as_secs()),
                        })
                    })
                }
            };
            let error = match result {
                Ok(records) => {
                    debug!("{label}: {} records after {attempt} attempt(s)", records.len());
                    return RetryOutcome::succeeded(records, attempt);
                }
                Err(error) => error,
            };
            if !error.is_rate_limited() || attempt >= self.policy.max_attempts {
                return RetryOutcome::failed(error, attempt);
            }
            let delay = self.policy.backoff_delay(attempt.saturating_sub(1));
            warn!(
                "{label}: rate limited on attempt {attempt}/{}, retrying in {}s",
                self.policy.max_attempts,
                delay.as_secs()
            );
            let interrupted = tokio::select! {
                biased;
                () = cancel.cancelled() => true,
                () = self.sleeper.sleep(delay) => false,
            };
            if interrupted {
                return RetryOutcome::failed(SourceError::Cancelled, attempt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ImmediateSleeper, RecordingSleeper};
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited() -> SourceError {
        SourceError::RateLimited {
            message: "429".into(),
        }
    }

    fn controller(sleeper: Arc<dyn Sleeper>) -> RetryController {
        RetryController::new(RetryPolicy::default(), sleeper)
    }

    #[rstest]
    #[case(0, 10)]
    #[case(1, 15)]
    #[case(2, 20)]
    #[case(4, 30)]
    #[case(u32::MAX, 30)]
    fn backoff_is_linear_and_capped(#[case] retry_index: u32, #[case] seconds: u64) {
        assert_eq!(
            RetryPolicy::default().backoff_delay(retry_index),
            Duration::from_secs(seconds)
        );
    }

    #[rstest]
    #[case(Duration::from_secs(1), MIN_ATTEMPT_TIMEOUT)]
    #[case(Duration::from_secs(11), Duration::from_secs(11))]
    #[case(Duration::from_secs(60), MAX_ATTEMPT_TIMEOUT)]
    fn attempt_timeout_is_clamped(#[case] requested: Duration, #[case] expected: Duration) {
        assert_eq!(
            RetryPolicy::new().with_attempt_timeout(requested).attempt_timeout(),
            expected
        );
    }

    #[rstest]
    #[tokio::test]
    async fn persistent_rate_limit_stops_after_max_attempts() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let calls = AtomicU32::new(0);
        let outcome = controller(sleeper.clone())
            .execute("test", &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            })
            .await;
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.error, Some(rate_limited()));
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(10), Duration::from_secs(15)]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn recovers_after_rate_limit() {
        let outcome = controller(Arc::new(ImmediateSleeper))
            .execute("test", &CancellationToken::new(), |attempt| async move {
                if attempt == 1 {
                    Err(rate_limited())
                } else {
                    Ok(vec![RawRecord::point("1", 60.0, 10.0, crate::Tags::new())])
                }
            })
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.records.len(), 1);
    }

    #[rstest]
    #[case(SourceError::Service { status: 500, message: String::new() })]
    #[case(SourceError::Transport { message: "reset".into() })]
    #[case(SourceError::MalformedResponse { message: "eof".into() })]
    #[tokio::test]
    async fn other_failures_are_not_retried(#[case] error: SourceError) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let expected = error.clone();
        let outcome = controller(sleeper.clone())
            .execute("test", &CancellationToken::new(), move |_| {
                let failure = error.clone();
                async move { Err(failure) }
            })
            .await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.error, Some(expected));
        assert!(sleeper.recorded().is_empty());
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out() {
        let outcome = controller(Arc::new(ImmediateSleeper))
            .execute("test", &CancellationToken::new(), |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            })
            .await;
        assert_eq!(outcome.attempts, 1);
        assert!(matches!(outcome.error, Some(SourceError::Timeout { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn cancelled_token_skips_the_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = controller(Arc::new(ImmediateSleeper))
            .execute("test", &cancel, |_| async { Ok(Vec::new()) })
            .await;
        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.error, Some(SourceError::Cancelled));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let retrying = RetryController::new(RetryPolicy::default(), Arc::new(TokioSleeper));
        let task = retrying.execute("test", &cancel, |_| async { Err(rate_limited()) });
        let (outcome, ()) = tokio::join!(task, async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.error, Some(SourceError::Cancelled));
    }
}
