//! # lynx-common
//!
//! Reliability primitives shared across the lynx kernel and its plug-ins:
//! circuit breaker, jittered retry, a standard error envelope, and logging
//! setup. Nothing in this crate knows about plug-ins, gRPC, or config
//! loading — those live in `lynx-core` and the `lynx-plugin-*` crates.

pub mod circuit_breaker;
pub mod error;
pub mod observability;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use error::{ErrorDetail, ErrorResponse};
pub use retry::{retry_with_backoff, RetryConfig, RetryFailure};
