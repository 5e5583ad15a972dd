//! Retry executor for transient store and upstream failures.
//!
//! Wraps a single async operation with bounded retries. Only the transience
//! of a failure is inspected: a status in the retryable set, or a message
//! mentioning a network, gateway or timeout failure.
//!
//! ### Backoff
//! - Attempt `n` (1-indexed) waits `min(base * 2^(n-1), max)` before attempt `n+1`.
//! - Up to 20% random jitter is added on top of each delay.
//! - Defaults: 250ms base, 4000ms cap, 5 attempts in total. A budget quoted as
//!   "5 retries" is therefore 4 retries after the first call; pass 6 for five
//!   retries on top of the initial attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// HTTP-like statuses treated as transient.
pub const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Message fragments (lowercase) that mark a failure as transient.
const TRANSIENT_MARKERS: &[&str] = &["network", "gateway", "timeout", "timed out"];

/// Maximum jitter as a fraction of the computed delay.
const JITTER_RATIO: f64 = 0.2;

/// Errors that can be classified by the retry executor.
pub trait RetryableError: Display {
    /// HTTP-like status attached to the failure, if any.
    fn status(&self) -> Option<u16> {
        None
    }

    /// Correlation id reported by the upstream, if any.
    fn trace_id(&self) -> Option<&str> {
        None
    }
}

/// Whether a failure with this status and message should be retried.
pub fn is_transient(status: Option<u16>, message: &str) -> bool {
    if status.is_some_and(|s| RETRYABLE_STATUSES.contains(&s)) {
        return true;
    }
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Retry configuration for a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one, not the number of retries.
    ///
    /// The default of 5 makes at most 4 retries. Set `retries + 1` when
    /// starting from a retry count.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on the pre-jitter delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay: Duration::from_millis(250), max_delay: Duration::from_millis(4000) }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    /// Pre-jitter delay after failed attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay with up to 20% random jitter added.
    fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        let jitter = rand::thread_rng().gen_range(0.0..=JITTER_RATIO);
        delay + delay.mul_f64(jitter)
    }
}

/// Why the executor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStop {
    /// The operation returned `Ok`.
    Succeeded,
    /// The failure was not transient; no retries were made after it.
    Permanent,
    /// Every attempt failed with a transient error.
    Exhausted,
}

/// Result of a retried operation along with how it got there.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
    pub stop: RetryStop,
    /// Status of the last failure.
    pub status: Option<u16>,
    /// Trace id reported with the last failure.
    pub trace_id: Option<String>,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn succeeded(&self) -> bool {
        self.stop == RetryStop::Succeeded
    }

    /// Number of extra attempts made after the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget runs out.
///
/// The operation is invoked afresh for every attempt. Backoff sleeps suspend
/// only the calling task.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> RetryOutcome<T, E>
where
    E: RetryableError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempts = attempt, "operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                    stop: RetryStop::Succeeded,
                    status: None,
                    trace_id: None,
                };
            }
            Err(err) => {
                let status = err.status();
                let trace_id = err.trace_id().map(str::to_string);
                let transient = is_transient(status, &err.to_string());

                if !transient || attempt >= max_attempts {
                    let stop = if transient { RetryStop::Exhausted } else { RetryStop::Permanent };
                    if stop == RetryStop::Exhausted {
                        tracing::warn!(
                            attempts = attempt,
                            status = ?status,
                            trace_id = trace_id.as_deref().unwrap_or("-"),
                            error = %err,
                            "retries exhausted"
                        );
                    }
                    return RetryOutcome { result: Err(err), attempts: attempt, stop, status, trace_id };
                }

                let wait = policy.jittered_delay_for(attempt);
                tracing::debug!(attempt, status = ?status, wait_ms = wait.as_millis() as u64, error = %err, "transient failure, backing off");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        status: Option<u16>,
        message: &'static str,
        trace_id: Option<&'static str>,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.message)
        }
    }

    impl RetryableError for TestError {
        fn status(&self) -> Option<u16> {
            self.status
        }

        fn trace_id(&self) -> Option<&str> {
            self.trace_id
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy { max_attempts: 5, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(4) }
    }

    #[test]
    fn test_is_transient_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_transient(Some(status), "boom"), "status {status} should be transient");
        }
        assert!(!is_transient(Some(400), "bad request"));
        assert!(!is_transient(Some(401), "unauthorized"));
        assert!(!is_transient(None, "syntax error"));
    }

    #[test]
    fn test_is_transient_messages() {
        assert!(is_transient(None, "Network request failed"));
        assert!(is_transient(None, "Bad Gateway"));
        assert!(is_transient(None, "request TIMEOUT"));
        assert!(is_transient(None, "operation timed out"));
    }

    #[test]
    fn test_default_budget_counts_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(4000));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let wait = policy.jittered_delay_for(2);
            assert!(wait >= Duration::from_millis(500));
            assert!(wait <= Duration::from_millis(600));
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_two_503s() {
        let calls = &AtomicU32::new(0);
        let outcome = with_retry(&fast_policy(), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err(TestError { status: Some(503), message: "unavailable", trace_id: None }) } else { Ok(42) }
        })
        .await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.retries(), 2);
        assert_eq!(outcome.into_result().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_immediately() {
        let calls = &AtomicU32::new(0);
        let outcome: RetryOutcome<(), _> = with_retry(&fast_policy(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError { status: Some(400), message: "bad request", trace_id: None })
        })
        .await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.stop, RetryStop::Permanent);
        assert_eq!(outcome.status, Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_error() {
        let calls = &AtomicU32::new(0);
        let outcome: RetryOutcome<(), _> = with_retry(&fast_policy(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError { status: Some(502), message: "bad gateway", trace_id: Some("trace-9") })
        })
        .await;

        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.retries(), 4);
        assert_eq!(outcome.stop, RetryStop::Exhausted);
        assert_eq!(outcome.status, Some(502));
        assert_eq!(outcome.trace_id.as_deref(), Some("trace-9"));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(outcome.result.is_err());
    }

    #[tokio::test]
    async fn test_message_based_retry() {
        let calls = &AtomicU32::new(0);
        let outcome = with_retry(&fast_policy(), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 { Err(TestError { status: None, message: "network error", trace_id: None }) } else { Ok("ok") }
        })
        .await;

        assert_eq!(outcome.attempts, 2);
        assert!(outcome.succeeded());
    }

    #[tokio::test]
    async fn test_none_policy_makes_single_attempt() {
        let outcome: RetryOutcome<(), _> = with_retry(&RetryPolicy::none(), || async {
            Err(TestError { status: Some(503), message: "unavailable", trace_id: None })
        })
        .await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.stop, RetryStop::Exhausted);
    }
}
