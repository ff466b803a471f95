use std::collections::HashMap;

use lynx_common::{CircuitBreakerConfig, RetryConfig};
use serde::Deserialize;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SERVICE_POOL_CAP: usize = 64;
pub const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 5;

/// Mirrors `lynx-plugin-grpc-service`'s `ClientAuthType`, numerically
/// aligned so the two subtrees stay in sync across a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[repr(u8)]
pub enum ClientAuthType {
    NoClientCert = 0,
    RequestClientCert = 1,
    RequireAnyClientCert = 2,
    VerifyClientCertIfGiven = 3,
    RequireAndVerifyClientCert = 4,
}

impl Default for ClientAuthType {
    fn default() -> Self {
        ClientAuthType::NoClientCert
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancer {
    RoundRobin,
    Random,
    WeightedRoundRobin,
    P2c,
    ConsistentHash,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        LoadBalancer::RoundRobin
    }
}

/// Selection strategy for picking a healthy pooled connection, distinct
/// from `LoadBalancer` (which governs discovery-side routing hints).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    RoundRobin,
    Random,
    LeastUsed,
    FirstAvailable,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}
fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}
fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}
fn default_circuit_breaker_threshold() -> u32 {
    DEFAULT_CIRCUIT_BREAKER_THRESHOLD
}
fn default_true() -> bool {
    true
}

/// `grpc.client.subscribe_services[]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribedService {
    pub name: String,
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub tls_enable: bool,
    #[serde(default)]
    pub tls_auth_type: ClientAuthType,
    #[serde(default)]
    pub load_balancer: LoadBalancer,
    #[serde(default = "default_true")]
    pub circuit_breaker_enabled: bool,
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SubscribedService {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_threshold,
            ..CircuitBreakerConfig::default()
        }
    }

    /// Maps the discovery-facing `LoadBalancer` hint to the pool's own
    /// connection selection strategy. `WeightedRoundRobin` and
    /// `ConsistentHash` have no pool-local equivalent without per-instance
    /// weights or keys from the discovery layer, so they fall back to the
    /// closest strategy the pool does support.
    pub fn selection_strategy(&self) -> SelectionStrategy {
        match self.load_balancer {
            LoadBalancer::RoundRobin | LoadBalancer::WeightedRoundRobin => SelectionStrategy::RoundRobin,
            LoadBalancer::Random => SelectionStrategy::Random,
            LoadBalancer::P2c => SelectionStrategy::LeastUsed,
            LoadBalancer::ConsistentHash => SelectionStrategy::FirstAvailable,
        }
    }
}

/// `grpc.client` subtree, bound via `RuntimeHandle::config`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_keep_alive_secs")]
    pub default_keep_alive_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub retry_backoff: RetryConfig,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default)]
    pub tls_enable: bool,
    #[serde(default)]
    pub tls_auth_type: ClientAuthType,
    #[serde(default = "default_true")]
    pub connection_pooling: bool,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub subscribe_services: Vec<SubscribedService>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            default_keep_alive_secs: default_keep_alive_secs(),
            max_retries: default_max_retries(),
            retry_backoff: RetryConfig::default(),
            max_connections: default_max_connections(),
            tls_enable: false,
            tls_auth_type: ClientAuthType::default(),
            connection_pooling: true,
            pool_size: default_pool_size(),
            idle_timeout_secs: default_idle_timeout_secs(),
            subscribe_services: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn default_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.default_timeout_secs)
    }

    pub fn default_keep_alive(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.default_keep_alive_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("grpc.client.subscribe_services[{0}].name must not be empty")]
    EmptyServiceName(usize),

    #[error("grpc.client.subscribe_services[{0}] ({1:?}) has neither an endpoint nor discovery configured")]
    NoTarget(usize, String),

    #[error("grpc.client.pool_size must be greater than zero when connection_pooling is enabled")]
    InvalidPoolSize,

    #[error("grpc.client.idle_timeout_secs must be greater than zero")]
    InvalidIdleTimeout,

    #[error("duplicate service name {0:?} in grpc.client.subscribe_services")]
    DuplicateServiceName(String),
}

/// Validates the client subtree. `discovery_configured` tells the
/// validator whether a discovery handle is present, since subscribed
/// services with no static endpoint are only valid when discovery can
/// resolve them.
pub fn validate(config: &ClientConfig, discovery_configured: bool) -> Result<(), ConfigValidationError> {
    if config.connection_pooling && config.pool_size == 0 {
        return Err(ConfigValidationError::InvalidPoolSize);
    }
    if config.idle_timeout_secs == 0 {
        return Err(ConfigValidationError::InvalidIdleTimeout);
    }

    let mut seen = std::collections::HashSet::new();
    for (index, service) in config.subscribe_services.iter().enumerate() {
        if service.name.is_empty() {
            return Err(ConfigValidationError::EmptyServiceName(index));
        }
        if !seen.insert(service.name.clone()) {
            return Err(ConfigValidationError::DuplicateServiceName(service.name.clone()));
        }
        if service.endpoint.is_none() && !discovery_configured {
            return Err(ConfigValidationError::NoTarget(index, service.name.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, endpoint: Option<&str>) -> SubscribedService {
        SubscribedService {
            name: name.to_string(),
            endpoint: endpoint.map(str::to_string),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            required: false,
            tls_enable: false,
            tls_auth_type: ClientAuthType::default(),
            load_balancer: LoadBalancer::default(),
            circuit_breaker_enabled: true,
            circuit_breaker_threshold: DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn defaults_validate_cleanly() {
        assert!(validate(&ClientConfig::default(), false).is_ok());
    }

    #[test]
    fn rejects_zero_pool_size_when_pooling_enabled() {
        let mut config = ClientConfig::default();
        config.pool_size = 0;
        assert!(matches!(validate(&config, false), Err(ConfigValidationError::InvalidPoolSize)));
    }

    #[test]
    fn rejects_service_with_no_endpoint_and_no_discovery() {
        let mut config = ClientConfig::default();
        config.subscribe_services.push(service("orders", None));
        assert!(matches!(validate(&config, false), Err(ConfigValidationError::NoTarget(0, _))));
    }

    #[test]
    fn accepts_service_with_no_endpoint_when_discovery_configured() {
        let mut config = ClientConfig::default();
        config.subscribe_services.push(service("orders", None));
        assert!(validate(&config, true).is_ok());
    }

    #[test]
    fn rejects_duplicate_service_names() {
        let mut config = ClientConfig::default();
        config.subscribe_services.push(service("orders", Some("http://orders:9090")));
        config.subscribe_services.push(service("orders", Some("http://orders2:9090")));
        assert!(matches!(validate(&config, false), Err(ConfigValidationError::DuplicateServiceName(_))));
    }
}
