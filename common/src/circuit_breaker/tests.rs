#[cfg(test)]
mod tests {
    use super::super::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
    use std::time::Duration;

    fn config(failure_threshold: u32, success_threshold: u32, recovery_timeout_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            success_threshold,
            recovery_timeout_ms,
            half_open_max_concurrent: 1,
        }
    }

    #[tokio::test]
    async fn closed_state_stays_closed_on_success() {
        let cb = CircuitBreaker::new(config(3, 2, 1000));
        assert_eq!(cb.get_state().await, CircuitState::Closed);

        let result = cb.call(async { Ok::<_, String>("ok") }).await;
        assert!(result.is_ok());
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures_reaches_threshold() {
        let cb = CircuitBreaker::new(config(3, 2, 1000));

        for _ in 0..3 {
            let _ = cb.call(async { Err::<String, _>("boom") }).await;
        }

        assert!(matches!(cb.get_state().await, CircuitState::Open { .. }));

        let result = cb.call(async { Ok::<_, String>("ok") }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));
    }

    #[tokio::test]
    async fn first_call_after_recovery_timeout_transitions_to_half_open() {
        let cb = CircuitBreaker::new(config(3, 2, 200));

        for _ in 0..3 {
            let _ = cb.call(async { Err::<String, _>("boom") }).await;
        }

        tokio::time::sleep(Duration::from_millis(250)).await;

        let _ = cb.call(async { Ok::<_, String>("ok") }).await;
        assert!(matches!(
            cb.get_state().await,
            CircuitState::HalfOpen | CircuitState::Closed
        ));
    }

    #[tokio::test]
    async fn two_consecutive_half_open_successes_close_the_circuit() {
        let cb = CircuitBreaker::new(config(3, 2, 200));

        for _ in 0..3 {
            let _ = cb.call(async { Err::<String, _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;

        for _ in 0..2 {
            let _ = cb.call(async { Ok::<_, String>("ok") }).await;
        }

        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn single_half_open_failure_reopens_circuit() {
        let cb = CircuitBreaker::new(config(3, 2, 200));

        for _ in 0..3 {
            let _ = cb.call(async { Err::<String, _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;

        let _ = cb.call(async { Err::<String, _>("boom") }).await;

        assert!(matches!(cb.get_state().await, CircuitState::Open { .. }));
    }

    /// threshold=3, recovery=1s, success-threshold=2: full open/half-open/closed cycle.
    #[tokio::test]
    async fn full_open_half_open_closed_cycle() {
        let cb = CircuitBreaker::new(config(3, 2, 1000));

        for _ in 0..3 {
            let _ = cb.call(async { Err::<String, _>("boom") }).await;
        }
        assert!(matches!(cb.get_state().await, CircuitState::Open { .. }));

        tokio::time::sleep(Duration::from_millis(1050)).await;

        let first = cb.call(async { Ok::<_, String>("ok") }).await;
        assert!(first.is_ok());
        assert_eq!(cb.get_state().await, CircuitState::HalfOpen);

        let second = cb.call(async { Ok::<_, String>("ok") }).await;
        assert!(second.is_ok());
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn stats_report_name_and_counts() {
        let cb = CircuitBreaker::with_name("svc", config(3, 2, 1000));

        for _ in 0..2 {
            let _ = cb.call(async { Err::<String, _>("boom") }).await;
        }

        let stats = cb.get_stats().await;
        assert_eq!(stats.name.as_deref(), Some("svc"));
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.consecutive_failures, 2);
        assert_eq!(stats.total_failures, 2);
    }

    #[tokio::test]
    async fn reset_forces_closed_and_clears_counters() {
        let cb = CircuitBreaker::new(config(2, 2, 1000));

        for _ in 0..2 {
            let _ = cb.call(async { Err::<String, _>("boom") }).await;
        }
        assert!(matches!(cb.get_state().await, CircuitState::Open { .. }));

        cb.reset().await;

        assert_eq!(cb.get_state().await, CircuitState::Closed);
        let stats = cb.get_stats().await;
        assert_eq!(stats.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn half_open_concurrency_limit_rejects_extra_trial_calls() {
        let mut cfg = config(2, 2, 100);
        cfg.half_open_max_concurrent = 1;
        let cb = CircuitBreaker::new(cfg);

        for _ in 0..2 {
            let _ = cb.call(async { Err::<String, _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        // First caller is admitted into half-open and holds the single slot
        // until it resolves; a concurrent second caller must be rejected.
        assert!(cb.can_execute().await);
        assert!(!cb.can_execute().await);
    }

    #[tokio::test]
    async fn concurrent_calls_tally_consistent_totals() {
        let cb = CircuitBreaker::new(config(10, 2, 1000));

        let mut handles = vec![];
        for i in 0..10 {
            let cb = cb.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    cb.call(async { Ok::<_, String>("ok") }).await
                } else {
                    cb.call(async { Err::<String, _>("boom") }).await
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let stats = cb.get_stats().await;
        assert_eq!(stats.total_successes, 5);
        assert_eq!(stats.total_failures, 5);
    }
}
