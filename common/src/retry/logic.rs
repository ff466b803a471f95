use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::RetryConfig;

/// Why a retry loop stopped without producing a success.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The operation exhausted `max_retries` attempts.
    Exhausted(E),
    /// The supplied cancellation token fired between attempts (or before
    /// the first attempt was made).
    Cancelled,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryFailure::Exhausted(e) => write!(f, "retries exhausted: {e}"),
            RetryFailure::Cancelled => write!(f, "retry cancelled"),
        }
    }
}

/// Retry an async operation with jittered exponential backoff.
///
/// `is_retryable` classifies each error; a non-retryable error returns
/// immediately without consuming a retry attempt. Respects `cancel`
/// between attempts and while sleeping, per the cancellation contract in
/// the gRPC client reliability plane.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    if cancel.is_cancelled() {
        return Err(RetryFailure::Cancelled);
    }

    let mut attempt = 0u32;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryFailure::Cancelled),
            result = operation() => result,
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    return Err(RetryFailure::Exhausted(error));
                }

                if attempt >= config.max_retries {
                    warn!(
                        attempt,
                        max_retries = config.max_retries,
                        error = %error,
                        "retries exhausted"
                    );
                    return Err(RetryFailure::Exhausted(error));
                }

                let backoff = config.jittered_backoff(attempt, rand::random::<f64>());
                warn!(
                    attempt,
                    max_retries = config.max_retries,
                    backoff_ms = backoff.as_millis(),
                    error = %error,
                    "retrying after backoff"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RetryFailure::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }

                attempt += 1;
            }
        }
    }
}
