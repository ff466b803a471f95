//! Jittered exponential backoff retry, shared by the gRPC client plug-in's
//! per-service retry middleware and any other reliability-sensitive caller.

mod config;
mod logic;

#[cfg(test)]
mod tests;

pub use config::RetryConfig;
pub use logic::{retry_with_backoff, RetryFailure};
