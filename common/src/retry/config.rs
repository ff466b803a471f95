use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with jitter, parameterized the way the gRPC client
/// plug-in's `retry_backoff` configuration expects.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial try.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds; attempt `n` waits `base * 2^n` before jitter.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on the un-jittered backoff.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Symmetric jitter fraction applied to the capped backoff, e.g. 0.25
    /// draws the final delay from `[75%, 125%]` of the capped value.
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_jitter_fraction() -> f64 {
    0.25
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

impl RetryConfig {
    /// The un-jittered, capped backoff for a given zero-indexed attempt.
    pub fn capped_backoff(&self, attempt: u32) -> Duration {
        let scaled = (self.base_delay_ms as f64) * 2f64.powi(attempt as i32);
        let capped_ms = scaled.min(self.max_delay_ms as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// The jittered backoff actually slept for a given attempt, using the
    /// supplied uniform sample in `[0.0, 1.0)` (injectable for deterministic
    /// tests; production callers use `rand::random()`).
    pub fn jittered_backoff(&self, attempt: u32, unit_sample: f64) -> Duration {
        let capped = self.capped_backoff(attempt).as_millis() as f64;
        let low = capped * (1.0 - self.jitter_fraction);
        let high = capped * (1.0 + self.jitter_fraction);
        let sampled = low + unit_sample * (high - low);
        Duration::from_millis(sampled.max(0.0) as u64)
    }
}
