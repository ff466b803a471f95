use lynx_common::{retry_with_backoff, RetryConfig, RetryFailure};
use tokio_util::sync::CancellationToken;
use tonic::Status;

use super::classify::is_retryable;

/// Runs `call` under the shared jittered-backoff retry loop, retrying only
/// on gRPC status codes classified as retryable and respecting `cancel`
/// between attempts.
pub async fn call_with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    call: F,
) -> Result<T, RetryFailure<Status>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, Status>>,
{
    retry_with_backoff(config, cancel, |status: &Status| is_retryable(status.code()), call).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_unavailable_until_success() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_fraction: 0.0,
        };
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = call_with_retry(&config, &cancel, || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt < 2 {
                    Err(Status::unavailable("not yet"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn does_not_retry_invalid_argument() {
        let config = RetryConfig::default();
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = call_with_retry(&config, &cancel, || {
            attempts.fetch_add(1, Ordering::Relaxed);
            async move { Err::<(), _>(Status::invalid_argument("bad")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }
}
