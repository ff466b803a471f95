//! Generic three-state circuit breaker.
//!
//! Shared by the application bootstrap's startup breaker (guarding
//! `LoadPlugins`) and the gRPC client plug-in's per-service breakers. The
//! failure/success classification is the caller's responsibility — this
//! module only owns the state machine and its locking discipline.

mod breaker;
mod types;

#[cfg(test)]
mod tests;

pub use breaker::CircuitBreaker;
pub use types::{CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState};
