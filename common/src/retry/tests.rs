#[cfg(test)]
mod tests {
    use super::super::{retry_with_backoff, RetryConfig, RetryFailure};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn config() -> RetryConfig {
        RetryConfig {
            max_retries: 4,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            jitter_fraction: 0.25,
        }
    }

    #[test]
    fn capped_backoff_doubles_until_the_cap() {
        let cfg = config();
        assert_eq!(cfg.capped_backoff(0), Duration::from_millis(100));
        assert_eq!(cfg.capped_backoff(1), Duration::from_millis(200));
        assert_eq!(cfg.capped_backoff(2), Duration::from_millis(400));
        // 100 * 2^10 would be ~102s, capped at 5s.
        assert_eq!(cfg.capped_backoff(10), Duration::from_millis(5_000));
    }

    #[test]
    fn jittered_backoff_stays_within_75_to_125_percent() {
        let cfg = config();
        for attempt in 0..6 {
            let capped = cfg.capped_backoff(attempt).as_millis() as f64;
            for sample in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let jittered = cfg.jittered_backoff(attempt, sample).as_millis() as f64;
                assert!(jittered >= capped * 0.75 - 1.0);
                assert!(jittered <= capped * 1.25 + 1.0);
            }
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_works() {
        let cfg = config();
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result: Result<&str, RetryFailure<&str>> = retry_with_backoff(
            &cfg,
            &cancel,
            |_: &&str| true,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, &str>("ok") }
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits_immediately() {
        let cfg = config();
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = retry_with_backoff(
            &cfg,
            &cancel,
            |_: &&str| false,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<&str, _>("permanent") }
            },
        )
        .await;

        assert!(matches!(result, Err(RetryFailure::Exhausted("permanent"))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_retries_and_reports_attempt_count() {
        let mut cfg = config();
        cfg.base_delay_ms = 1;
        cfg.max_delay_ms = 5;
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let result = retry_with_backoff(
            &cfg,
            &cancel,
            |_: &&str| true,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<&str, _>("transient") }
            },
        )
        .await;

        assert!(matches!(result, Err(RetryFailure::Exhausted("transient"))));
        // One initial attempt + max_retries retries.
        assert_eq!(attempts.load(Ordering::SeqCst), cfg.max_retries + 1);
    }

    #[tokio::test]
    async fn cancellation_before_any_attempt_returns_cancelled() {
        let cfg = config();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = retry_with_backoff(
            &cfg,
            &cancel,
            |_: &&str| true,
            || async { Ok::<_, &str>("should not run") },
        )
        .await;

        assert!(matches!(result, Err(RetryFailure::Cancelled)));
    }

    #[tokio::test]
    async fn cancellation_during_backoff_sleep_returns_cancelled() {
        let mut cfg = config();
        cfg.base_delay_ms = 200;
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let result = retry_with_backoff(
            &cfg,
            &cancel,
            |_: &&str| true,
            || async { Err::<&str, _>("transient") },
        )
        .await;

        assert!(matches!(result, Err(RetryFailure::Cancelled)));
    }
}
