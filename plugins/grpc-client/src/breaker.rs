use std::collections::HashMap;

use lynx_common::{CircuitBreaker, CircuitBreakerConfig};
use tokio::sync::RwLock;
use tonic::Status;

use super::classify::is_breaker_failure;

/// Per-service circuit breakers. Each service gets its own independent
/// breaker instance; a fault in one subscribed service never trips
/// another's.
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, service: &str, config: CircuitBreakerConfig) {
        let breaker = CircuitBreaker::with_name(service, config);
        self.breakers.write().await.insert(service.to_string(), breaker);
    }

    async fn get(&self, service: &str) -> Option<CircuitBreaker> {
        self.breakers.read().await.get(service).cloned()
    }

    /// Whether a call to `service` may proceed. Services with no
    /// registered breaker (circuit breaking disabled for them) always
    /// admit the call.
    pub async fn can_execute(&self, service: &str) -> bool {
        match self.get(service).await {
            Some(breaker) => breaker.can_execute().await,
            None => true,
        }
    }

    /// Records the outcome of a call against the service's breaker,
    /// classifying the gRPC status per the contract: codes that indicate
    /// caller error rather than service fault never count as failures.
    pub async fn record_result(&self, service: &str, result: &Result<(), Status>) {
        let Some(breaker) = self.get(service).await else {
            return;
        };

        match result {
            Ok(()) => breaker.record_success().await,
            Err(status) => {
                if is_breaker_failure(status.code()) {
                    breaker.record_failure().await;
                } else {
                    breaker.record_success().await;
                }
            }
        }
    }

    /// Local cancellation (the caller's own context, not a status the
    /// service returned) is never a service fault.
    pub async fn record_local_cancellation(&self, service: &str) {
        if let Some(breaker) = self.get(service).await {
            breaker.record_success().await;
        }
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_service_always_admits() {
        let registry = BreakerRegistry::new();
        assert!(registry.can_execute("unknown").await);
    }

    #[tokio::test]
    async fn repeated_faults_open_the_breaker() {
        let registry = BreakerRegistry::new();
        registry
            .register(
                "orders",
                CircuitBreakerConfig {
                    failure_threshold: 2,
                    ..CircuitBreakerConfig::default()
                },
            )
            .await;

        registry.record_result("orders", &Err(Status::unavailable("down"))).await;
        registry.record_result("orders", &Err(Status::unavailable("down"))).await;

        assert!(!registry.can_execute("orders").await);
    }

    #[tokio::test]
    async fn invalid_argument_never_opens_the_breaker() {
        let registry = BreakerRegistry::new();
        registry
            .register(
                "orders",
                CircuitBreakerConfig {
                    failure_threshold: 1,
                    ..CircuitBreakerConfig::default()
                },
            )
            .await;

        for _ in 0..10 {
            registry.record_result("orders", &Err(Status::invalid_argument("bad"))).await;
        }

        assert!(registry.can_execute("orders").await);
    }
}
