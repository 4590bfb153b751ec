use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

// ============================================================================
// Retry With Exponential Backoff
// ============================================================================
//
// Used for read-only calls to external payment providers (charge status
// checks). Charge creation is never retried: a retried create could open a
// second charge for the same order.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    fn next_delay(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis((delay.as_millis() as f64 * self.multiplier) as u64);
        next.min(self.max_delay)
    }
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Still failing after `max_attempts`
    Failed(E),
    /// Error was not transient; no further attempts were made
    PermanentFailure(E),
}

/// Whether an error may go away if the same call is repeated.
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Run `operation` until it succeeds, fails permanently, or runs out of
/// attempts. The closure receives the 1-based attempt number.
pub async fn retry_on_transient<F, Fut, T, E>(config: RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Call succeeded after retry");
                }
                return RetryResult::Success(value);
            }
            Err(error) => error,
        };

        if !error.is_transient() {
            tracing::warn!(attempt = attempt, error = %error, "Permanent failure, not retrying");
            return RetryResult::PermanentFailure(error);
        }

        if attempt >= config.max_attempts {
            tracing::error!(attempt = attempt, error = %error, "Giving up after all retries");
            return RetryResult::Failed(error);
        }

        tracing::warn!(
            attempt = attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying"
        );
        sleep(delay).await;
        delay = config.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum CallError {
        Timeout,
        Rejected,
    }

    impl std::fmt::Display for CallError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                CallError::Timeout => write!(f, "timeout"),
                CallError::Rejected => write!(f, "rejected"),
            }
        }
    }

    impl IsTransient for CallError {
        fn is_transient(&self) -> bool {
            matches!(self, CallError::Timeout)
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);

        let result = retry_on_transient(fast(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CallError::Timeout)
                } else {
                    Ok("paid")
                }
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Success("paid")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_immediately() {
        let calls = AtomicU32::new(0);

        let result = retry_on_transient(fast(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(CallError::Rejected) }
        })
        .await;

        assert!(matches!(result, RetryResult::PermanentFailure(CallError::Rejected)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let result = retry_on_transient(fast(), |_| async { Err::<(), _>(CallError::Timeout) }).await;

        assert!(matches!(result, RetryResult::Failed(CallError::Timeout)));
    }

    #[test]
    fn test_delay_is_capped() {
        let config = fast();
        assert_eq!(config.next_delay(Duration::from_millis(5)), Duration::from_millis(10));
        assert_eq!(config.next_delay(Duration::from_millis(15)), Duration::from_millis(20));
    }
}
