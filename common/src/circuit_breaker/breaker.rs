use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::{
    CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitInner, CircuitState,
};

/// Bound on the Closed-state consecutive-success counter so long-lived
/// breakers don't grow an unbounded integer under sustained success.
const CLOSED_SUCCESS_HIGH_WATER_MARK: u64 = 1000;

/// Three-state circuit breaker (Closed / Open / HalfOpen).
///
/// State and counters live behind a single exclusive lock: `can_execute`
/// can itself perform the Open -> HalfOpen transition, so there must never
/// be a window where a reader observes Open while a concurrent caller is
/// mid-transition to HalfOpen.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Option<String>,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<CircuitInner>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            name: None,
            config,
            inner: Arc::new(Mutex::new(CircuitInner::default())),
        }
    }

    pub fn with_name(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            name = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            recovery_timeout_ms = config.recovery_timeout_ms,
            "creating circuit breaker"
        );
        Self {
            name: Some(name),
            config,
            inner: Arc::new(Mutex::new(CircuitInner::default())),
        }
    }

    /// Execute an async operation through the breaker.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        if !self.can_execute().await {
            return Err(CircuitBreakerError::Open);
        }

        match operation.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(e) => {
                self.record_failure().await;
                Err(CircuitBreakerError::OperationFailed(e))
            }
        }
    }

    /// Whether a caller may proceed. Performs the Open -> HalfOpen
    /// transition as a side effect of the first call after the recovery
    /// timeout elapses, and admits at most `half_open_max_concurrent`
    /// concurrent trial calls while HalfOpen.
    pub async fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().await;

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.half_open_inflight < self.config.half_open_max_concurrent {
                    inner.half_open_inflight += 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.recovery_timeout() {
                    self.log_transition("OPEN", "HALF_OPEN");
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.consecutive_failures = 0;
                    inner.half_open_inflight = 1;
                    true
                } else {
                    debug!(name = ?self.name, "circuit breaker is OPEN, rejecting call");
                    false
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.total_successes += 1;
        inner.consecutive_failures = 0;

        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    self.log_transition("HALF_OPEN", "CLOSED");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_successes = 0;
                    inner.closed_successes_since_reset = 0;
                }
            }
            CircuitState::Closed => {
                inner.consecutive_successes += 1;
                inner.closed_successes_since_reset += 1;
                if inner.closed_successes_since_reset >= CLOSED_SUCCESS_HIGH_WATER_MARK {
                    inner.closed_successes_since_reset = 0;
                    inner.consecutive_successes = 0;
                }
            }
            CircuitState::Open { .. } => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.total_failures += 1;
        inner.consecutive_successes = 0;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        name = ?self.name,
                        consecutive_failures = inner.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "circuit breaker transitioning CLOSED -> OPEN"
                    );
                    inner.state = CircuitState::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            CircuitState::HalfOpen => {
                inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
                warn!(name = ?self.name, "circuit breaker transitioning HALF_OPEN -> OPEN");
                inner.state = CircuitState::Open {
                    opened_at: Instant::now(),
                };
                // A single half-open failure reopens with the counter reset to 1.
                inner.consecutive_failures = 1;
            }
            CircuitState::Open { .. } => {}
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.inner.lock().await.state.clone()
    }

    pub async fn get_stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock().await;
        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state.clone(),
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
        }
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        info!(name = ?self.name, "manually resetting circuit breaker to CLOSED");
        *inner = CircuitInner::default();
    }

    fn log_transition(&self, from: &str, to: &str) {
        info!(name = ?self.name, from, to, "circuit breaker state transition");
    }
}
