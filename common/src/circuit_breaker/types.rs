use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Circuit breaker configuration shared by the startup breaker and every
/// per-service gRPC client breaker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures (Closed) before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive successes (HalfOpen) before the circuit closes.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Wall-clock wait before Open transitions to HalfOpen.
    #[serde(default = "default_recovery_timeout_ms", rename = "recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,

    /// Maximum number of concurrent trial calls admitted while HalfOpen.
    #[serde(default = "default_half_open_concurrency")]
    pub half_open_max_concurrent: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_recovery_timeout_ms() -> u64 {
    30_000
}

fn default_half_open_concurrency() -> u32 {
    1
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
            half_open_max_concurrent: default_half_open_concurrency(),
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

/// Circuit breaker error.
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    Open,

    #[error("operation failed: {0}")]
    OperationFailed(E),
}

/// Point-in-time statistics for monitoring/health aggregation.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub name: Option<String>,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_failures: u64,
    pub total_successes: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CircuitInner {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub half_open_inflight: u32,
    /// High-water reset counter for the Closed-state success count, so it
    /// never grows unbounded under long sustained success.
    pub closed_successes_since_reset: u64,
}

impl Default for CircuitState {
    fn default() -> Self {
        CircuitState::Closed
    }
}
