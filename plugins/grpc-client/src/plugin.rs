use std::sync::Arc;

use async_trait::async_trait;
use lynx_core::plugin::{Plugin, PluginError, RuntimeHandle, REQUIRED_UPSTREAMS_READY};
use tokio::sync::Mutex;
use tonic::transport::{Channel, Endpoint};

use super::breaker::BreakerRegistry;
use super::config::{self, ClientConfig};
use super::discovery::{DiscoveryHandle, NodeFilter, TargetResolver};
use super::pool::ConnectionPool;
use super::tls::{ClientCertificateProvider, ClientTlsManager};

const CONFIG_PREFIX: &str = "grpc.client";
pub(crate) const SHARED_RESOURCE_KEY: &str = "grpc-client";

/// Connects to `target`, applying per-service TLS credentials when the
/// service has them configured. Mirrors the endpoint assembly the service
/// side uses: timeout, keep-alive, and (if present) TLS are all set before
/// the lazy connect.
async fn connect(
    target: &str,
    service: &str,
    timeout: std::time::Duration,
    keep_alive: std::time::Duration,
    tls: &Arc<ClientTlsManager>,
    tls_enabled: bool,
) -> Result<Channel, tonic::transport::Error> {
    let mut endpoint = Endpoint::from_shared(target.to_string())?
        .timeout(timeout)
        .keep_alive_timeout(keep_alive)
        .keep_alive_while_idle(true);

    if tls_enabled {
        if let Ok(tls_config) = tls.get_credentials(service).await {
            endpoint = endpoint.tls_config(tls_config)?;
        }
    }

    endpoint.connect().await
}

/// The gRPC client plug-in: owns per-service connection pools, circuit
/// breakers, TLS credentials, and discovery-backed target resolution, and
/// publishes a [`GrpcClient`] handle for business code to call through.
pub struct GrpcClientPlugin {
    config: Mutex<Option<ClientConfig>>,
    pool: Arc<ConnectionPool>,
    breakers: Arc<BreakerRegistry>,
    tls: Arc<ClientTlsManager>,
    resolver: Arc<TargetResolver>,
    tls_material_provider: Option<Arc<dyn ClientCertificateProvider>>,
}

impl GrpcClientPlugin {
    pub fn new(
        discovery: Option<Arc<dyn DiscoveryHandle>>,
        node_filter: Option<Arc<dyn NodeFilter>>,
        tls_material_provider: Option<Arc<dyn ClientCertificateProvider>>,
    ) -> Self {
        Self {
            config: Mutex::new(None),
            pool: ConnectionPool::new(true, config::DEFAULT_SERVICE_POOL_CAP, config::DEFAULT_POOL_SIZE, std::time::Duration::from_secs(config::DEFAULT_IDLE_TIMEOUT_SECS)),
            breakers: Arc::new(BreakerRegistry::new()),
            tls: Arc::new(ClientTlsManager::new()),
            resolver: Arc::new(TargetResolver::new(discovery, node_filter)),
            tls_material_provider,
        }
    }
}

#[async_trait]
impl Plugin for GrpcClientPlugin {
    fn name(&self) -> &str {
        "grpc-client"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "per-service gRPC connection pools, circuit breakers, retry, and client TLS"
    }

    fn config_prefix(&self) -> &str {
        CONFIG_PREFIX
    }

    fn weight(&self) -> i32 {
        90
    }

    async fn initialize_resources(&mut self, runtime: &RuntimeHandle) -> Result<(), PluginError> {
        let client_config: ClientConfig = runtime
            .config()
            .map_err(|e| PluginError::InitFailed(format!("failed to bind {CONFIG_PREFIX}: {e}")))?;
        config::validate(&client_config, self.resolver.is_discovery_configured())
            .map_err(|e| PluginError::InitFailed(e.to_string()))?;

        self.pool = ConnectionPool::new(
            client_config.connection_pooling,
            config::DEFAULT_SERVICE_POOL_CAP,
            client_config.pool_size,
            client_config.idle_timeout(),
        );
        self.pool.start_sweeper();

        for service in &client_config.subscribe_services {
            if service.circuit_breaker_enabled {
                self.breakers.register(&service.name, service.circuit_breaker_config()).await;
            }

            if client_config.tls_enable || service.tls_enable {
                if let Some(provider) = &self.tls_material_provider {
                    if let Some(material) = provider.material_for(&service.name) {
                        self.tls
                            .set_service_config(&service.name, material)
                            .await
                            .map_err(|e| PluginError::InitFailed(format!("TLS assembly failed for {:?}: {e}", service.name)))?;
                    }
                }
            }
        }

        let required: Vec<_> = client_config.subscribe_services.iter().filter(|s| s.required).collect();
        if !required.is_empty() {
            runtime.shared_resource_table().publish_required_upstreams_ready(false).await;

            let mut all_reachable = true;
            for service in &required {
                let target = self
                    .resolver
                    .target_for(service)
                    .ok_or_else(|| PluginError::InitFailed(format!("required service {:?} has no resolvable target", service.name)))?;

                let connected = connect(
                    &target,
                    &service.name,
                    service.timeout(),
                    client_config.default_keep_alive(),
                    &self.tls,
                    client_config.tls_enable || service.tls_enable,
                )
                .await;

                if connected.is_err() {
                    all_reachable = false;
                    runtime.log_warn(&format!("required upstream {:?} was not reachable during startup", service.name));
                }
            }

            runtime.shared_resource_table().publish_required_upstreams_ready(all_reachable).await;
        }

        let client = Arc::new(GrpcClient {
            config: client_config.clone(),
            pool: self.pool.clone(),
            breakers: self.breakers.clone(),
            resolver: self.resolver.clone(),
            tls: self.tls.clone(),
        });
        runtime.shared_set(SHARED_RESOURCE_KEY, client, std::mem::size_of::<GrpcClient>()).await;

        *self.config.lock().await = Some(client_config);
        runtime.log_info("gRPC client plug-in resources initialized");
        Ok(())
    }

    async fn startup_tasks(&mut self, runtime: &RuntimeHandle) -> Result<(), PluginError> {
        runtime.log_info("gRPC client plug-in ready");
        Ok(())
    }

    async fn check_health(&self, runtime: &RuntimeHandle) -> Result<(), PluginError> {
        let ready = runtime.shared_resource_table().required_upstreams_ready().await.unwrap_or(true);
        if !ready {
            return Err(PluginError::HealthCheckFailed(format!("{REQUIRED_UPSTREAMS_READY} is false")));
        }
        Ok(())
    }

    async fn cleanup_tasks(&mut self, runtime: &RuntimeHandle) -> Result<(), PluginError> {
        self.pool.close_all().await;
        runtime.log_info("gRPC client plug-in cleaned up");
        Ok(())
    }

    /// Validates the replacement subtree and re-registers circuit breakers
    /// for any newly added subscribed services. Pool sizing, TLS, and
    /// discovery wiring are fixed at startup and are not touched here — a
    /// restart is required for changes to those fields to take effect.
    async fn configure(&mut self, raw: serde_json::Value, runtime: &RuntimeHandle) -> Result<(), PluginError> {
        let candidate: ClientConfig = serde_json::from_value(raw).map_err(|e| PluginError::ConfigureRejected(e.to_string()))?;
        config::validate(&candidate, self.resolver.is_discovery_configured()).map_err(|e| PluginError::ConfigureRejected(e.to_string()))?;

        for service in &candidate.subscribe_services {
            if service.circuit_breaker_enabled {
                self.breakers.register(&service.name, service.circuit_breaker_config()).await;
            }
        }

        *self.config.lock().await = Some(candidate);
        runtime.log_info("gRPC client plug-in configuration updated");
        Ok(())
    }
}

/// Consumer-facing handle published into the shared resource table: wraps
/// connection pooling, circuit breaking, and target resolution behind a
/// single `get_channel` call so business code never touches the pool or
/// breaker registry directly.
pub struct GrpcClient {
    config: ClientConfig,
    pool: Arc<ConnectionPool>,
    breakers: Arc<BreakerRegistry>,
    resolver: Arc<TargetResolver>,
    tls: Arc<ClientTlsManager>,
}

impl GrpcClient {
    /// Whether a call to `service` is currently admitted by its circuit
    /// breaker. Callers check this before acquiring a channel so an open
    /// breaker fails fast without touching the pool.
    pub async fn can_call(&self, service: &str) -> bool {
        self.breakers.can_execute(service).await
    }

    /// Records the outcome of a completed call against `service`'s breaker.
    pub async fn record_result(&self, service: &str, result: &Result<(), tonic::Status>) {
        self.breakers.record_result(service, result).await;
    }

    /// Records a call abandoned by the caller's own context (cancellation
    /// or local deadline), as distinct from a status the service returned —
    /// never counted against the breaker.
    pub async fn record_local_cancellation(&self, service: &str) {
        self.breakers.record_local_cancellation(service).await;
    }

    /// Acquires a pooled channel for `service`, resolving its target via
    /// discovery when configured or its static endpoint otherwise.
    pub async fn get_channel(&self, service_name: &str) -> Result<Channel, super::error::GrpcClientError> {
        let service = self
            .config
            .subscribe_services
            .iter()
            .find(|s| s.name == service_name)
            .ok_or_else(|| super::error::GrpcClientError::UnknownService(service_name.to_string()))?;

        let target = self
            .resolver
            .target_for(service)
            .ok_or_else(|| super::error::GrpcClientError::UnknownService(service_name.to_string()))?;

        let tls = self.tls.clone();
        let tls_enabled = self.config.tls_enable || service.tls_enable;
        let timeout = service.timeout();
        let keep_alive = self.config.default_keep_alive();
        let service_name_owned = service_name.to_string();

        self.pool
            .get_connection(service_name, service.selection_strategy(), move || {
                let target = target.clone();
                let tls = tls.clone();
                let service_name = service_name_owned.clone();
                async move { connect(&target, &service_name, timeout, keep_alive, &tls, tls_enabled).await }
            })
            .await
            .map_err(|source| super::error::GrpcClientError::Connect {
                service: service_name.to_string(),
                endpoint: target_display(service),
                source,
            })
    }
}

fn target_display(service: &super::config::SubscribedService) -> String {
    service.endpoint.clone().unwrap_or_else(|| format!("discovery:///{}", service.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_identity_matches_the_four_part_scheme() {
        let plugin = GrpcClientPlugin::new(None, None, None);
        assert_eq!(plugin.name(), "grpc-client");
        assert_eq!(plugin.config_prefix(), CONFIG_PREFIX);
    }
}
