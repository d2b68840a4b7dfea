//! Retry with exponential backoff, and a circuit breaker

use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// `base_delay · backoff_factor^attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .mul_f64(self.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32))
    }

    /// Run `op` up to `max_retries + 1` times, sleeping between failures.
    /// The last error is returned when every attempt fails.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.delay(attempt);
                    tracing::warn!(attempt = attempt + 1, error = %e, delay_ms = delay.as_millis() as u64, "Attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempts = attempt + 1, error = %e, "All attempts failed");
                    return Err(e);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    #[error("Circuit breaker is open")]
    Open,

    #[error(transparent)]
    Inner(E),
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
            }),
        }
    }

    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == CircuitState::Open {
                let elapsed = inner.last_failure.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                if elapsed < self.recovery_timeout {
                    return Err(CircuitError::Open);
                }
                inner.state = CircuitState::HalfOpen;
                tracing::info!("Circuit breaker half-open");
            }
        }

        // The lock is not held across the call
        match op().await {
            Ok(value) => {
                let mut inner = self.inner.lock().await;
                if inner.state == CircuitState::HalfOpen {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    tracing::info!("Circuit breaker closed");
                }
                Ok(value)
            }
            Err(e) => {
                let mut inner = self.inner.lock().await;
                inner.failures += 1;
                inner.last_failure = Some(Instant::now());
                if inner.failures >= self.failure_threshold && inner.state != CircuitState::Open {
                    inner.state = CircuitState::Open;
                    tracing::warn!(failures = inner.failures, "Circuit breaker opened");
                }
                Err(CircuitError::Inner(e))
            }
        }
    }

    pub async fn state(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().await;
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failures,
            failure_threshold: self.failure_threshold,
            recovery_timeout_secs: self.recovery_timeout.as_secs(),
        }
    }
}
