use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Wraps calls to an external payment provider. After `failure_threshold`
// consecutive failures the circuit opens and calls fail fast, so an order
// request does not sit on open row locks waiting for a dead provider.
// Once `open_timeout` has passed, calls are let through again (half-open);
// `success_threshold` successes close the circuit, one failure reopens it.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge value exported to Prometheus.
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("{0}")]
    OperationFailed(E),
}

struct Counters {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    counters: Arc<Mutex<Counters>>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            counters: Arc::new(Mutex::new(Counters {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            })),
        }
    }

    pub async fn call<Fut, T, E>(&self, operation: Fut) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(operation, |_| true).await
    }

    /// Like `call`, but only errors for which `trips` returns true count
    /// as failures. Other errors are passed through and leave the circuit
    /// as if the call had succeeded.
    pub async fn call_with<Fut, T, E, F>(&self, operation: Fut, trips: F) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
        F: Fn(&E) -> bool,
    {
        if !self.admit().await {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        let result = operation.await;
        let failed = result.as_ref().err().map_or(false, |e| trips(e));
        self.record(!failed).await;
        result.map_err(CircuitBreakerError::OperationFailed)
    }

    pub async fn state(&self) -> CircuitState {
        self.counters.lock().await.state
    }

    /// Whether a call may go through right now.
    async fn admit(&self) -> bool {
        let mut c = self.counters.lock().await;
        if c.state != CircuitState::Open {
            return true;
        }

        let cooled_down = c
            .opened_at
            .map_or(true, |at| at.elapsed() >= self.config.open_timeout);
        if !cooled_down {
            return false;
        }

        tracing::info!(breaker = self.name, "Circuit half-open, letting a trial call through");
        c.state = CircuitState::HalfOpen;
        c.successes = 0;
        true
    }

    async fn record(&self, ok: bool) {
        let mut c = self.counters.lock().await;

        if ok {
            c.failures = 0;
            if c.state == CircuitState::HalfOpen {
                c.successes += 1;
                if c.successes >= self.config.success_threshold {
                    tracing::info!(breaker = self.name, "✅ Circuit closed");
                    c.state = CircuitState::Closed;
                    c.successes = 0;
                    c.opened_at = None;
                }
            }
            return;
        }

        c.failures += 1;
        let trip = match c.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => c.failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if trip {
            tracing::warn!(breaker = self.name, failures = c.failures, "Circuit opened");
            c.state = CircuitState::Open;
            c.successes = 0;
            c.opened_at = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 2,
                open_timeout,
                success_threshold: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let cb = breaker(Duration::from_secs(60));

        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("refused") }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        let result = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen)));
    }

    #[tokio::test]
    async fn test_errors_that_do_not_trip_keep_circuit_closed() {
        let cb = breaker(Duration::from_secs(60));

        for _ in 0..5 {
            let result = cb
                .call_with(async { Err::<(), _>("bad request") }, |e| *e != "bad request")
                .await;
            assert!(matches!(result, Err(CircuitBreakerError::OperationFailed("bad request"))));
        }
        assert_eq!(cb.state().await, CircuitState::Closed);

        for _ in 0..2 {
            let _ = cb.call_with(async { Err::<(), _>("timeout") }, |e| *e != "bad request").await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let cb = breaker(Duration::from_secs(60));

        let _ = cb.call(async { Err::<(), _>("refused") }).await;
        let _ = cb.call(async { Ok::<_, &str>(()) }).await;
        let _ = cb.call(async { Err::<(), _>("refused") }).await;

        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_success_closes_circuit() {
        let cb = breaker(Duration::from_millis(20));
        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("refused") }).await;
        }

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cb.call(async { Ok::<_, &str>(()) }).await.is_ok());
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(Duration::from_millis(20));
        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("refused") }).await;
        }

        tokio::time::sleep(Duration::from_millis(40)).await;
        let _ = cb.call(async { Err::<(), _>("still down") }).await;

        assert_eq!(cb.state().await, CircuitState::Open);
    }
}
