use std::sync::Arc;

use super::config::SubscribedService;

/// A single resolved instance of a subscribed service, as reported by
/// whatever discovery backend a deployment plugs in. The client never
/// depends on a specific discovery mechanism — only this narrow shape.
#[derive(Debug, Clone)]
pub struct ServiceInstance {
    pub address: String,
    pub metadata: std::collections::HashMap<String, String>,
}

/// Resolves subscribed service names to live instances. Concrete
/// discovery backends (registry polling, DNS SRV, a config-center push
/// feed) live outside this crate and are handed in as a trait object.
#[async_trait::async_trait]
pub trait DiscoveryHandle: Send + Sync {
    async fn resolve(&self, service: &str) -> Option<Vec<ServiceInstance>>;
}

/// An optional hook letting a deployment filter or re-rank the instances
/// a discovery handle returns before the pool connects to any of them —
/// zone-affinity routing, canary exclusion, and similar concerns.
pub trait NodeFilter: Send + Sync {
    fn filter(&self, service: &str, instances: Vec<ServiceInstance>) -> Vec<ServiceInstance>;
}

/// Produces the connection target for a subscribed service: the
/// `discovery:///{service}` pseudo-target when a discovery handle is
/// configured, otherwise the service's static endpoint.
pub struct TargetResolver {
    discovery: Option<Arc<dyn DiscoveryHandle>>,
    node_filter: Option<Arc<dyn NodeFilter>>,
}

impl TargetResolver {
    pub fn new(discovery: Option<Arc<dyn DiscoveryHandle>>, node_filter: Option<Arc<dyn NodeFilter>>) -> Self {
        Self { discovery, node_filter }
    }

    pub fn is_discovery_configured(&self) -> bool {
        self.discovery.is_some()
    }

    /// Returns the connection target string for `service`. Does not
    /// itself resolve instances — that happens per-connection through
    /// `resolve_instances`, since a pseudo-target alone can't carry a
    /// concrete address.
    pub fn target_for(&self, service: &SubscribedService) -> Option<String> {
        if self.discovery.is_some() {
            Some(format!("discovery:///{}", service.name))
        } else {
            service.endpoint.clone()
        }
    }

    /// Resolves live instances for `service` via the configured discovery
    /// handle, applying the node filter if one is set. Returns `None` when
    /// no discovery handle is configured — callers fall back to the
    /// static endpoint in that case.
    pub async fn resolve_instances(&self, service: &str) -> Option<Vec<ServiceInstance>> {
        let handle = self.discovery.as_ref()?;
        let instances = handle.resolve(service).await?;
        Some(match &self.node_filter {
            Some(filter) => filter.filter(service, instances),
            None => instances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticDiscovery;

    #[async_trait::async_trait]
    impl DiscoveryHandle for StaticDiscovery {
        async fn resolve(&self, _service: &str) -> Option<Vec<ServiceInstance>> {
            Some(vec![ServiceInstance {
                address: "10.0.0.1:9090".to_string(),
                metadata: HashMap::new(),
            }])
        }
    }

    fn service(name: &str, endpoint: Option<&str>) -> SubscribedService {
        SubscribedService {
            name: name.to_string(),
            endpoint: endpoint.map(str::to_string),
            timeout_secs: 10,
            required: false,
            tls_enable: false,
            tls_auth_type: super::super::config::ClientAuthType::default(),
            load_balancer: super::super::config::LoadBalancer::default(),
            circuit_breaker_enabled: true,
            circuit_breaker_threshold: 5,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn falls_back_to_static_endpoint_without_discovery() {
        let resolver = TargetResolver::new(None, None);
        let target = resolver.target_for(&service("orders", Some("http://orders:9090")));
        assert_eq!(target.as_deref(), Some("http://orders:9090"));
    }

    #[test]
    fn uses_pseudo_target_when_discovery_configured() {
        let resolver = TargetResolver::new(Some(Arc::new(StaticDiscovery)), None);
        let target = resolver.target_for(&service("orders", None));
        assert_eq!(target.as_deref(), Some("discovery:///orders"));
    }

    #[tokio::test]
    async fn resolves_instances_through_discovery_handle() {
        let resolver = TargetResolver::new(Some(Arc::new(StaticDiscovery)), None);
        let instances = resolver.resolve_instances("orders").await.unwrap();
        assert_eq!(instances.len(), 1);
    }

    #[tokio::test]
    async fn no_discovery_returns_none() {
        let resolver = TargetResolver::new(None, None);
        assert!(resolver.resolve_instances("orders").await.is_none());
    }
}
