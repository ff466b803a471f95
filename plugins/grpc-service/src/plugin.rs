use std::sync::Arc;

use async_trait::async_trait;
use lynx_core::plugin::{Plugin, PluginError, RuntimeHandle};
use tokio::sync::Mutex;
use tracing::info;

use super::config::{self, ServiceConfig};
use super::health::HealthPoller;
use super::middleware::{RateLimitGate, ServiceMetrics};
use super::probe::PortProbe;
use super::server::{BoxedHealthService, GrpcManagedServer};
use super::tls::{build_server_tls_config, CertificateProvider};

const CONFIG_PREFIX: &str = "grpc.service";
pub(crate) const SHARED_RESOURCE_KEY: &str = "grpc-service-server";

/// The gRPC service plug-in: owns the tonic server assembly and publishes
/// it into the shared resource table for the wire function to pick up.
pub struct GrpcServicePlugin {
    application_name: String,
    certificate_provider: Option<Arc<dyn CertificateProvider>>,
    rate_limit_gate: Option<Arc<dyn RateLimitGate>>,
    config: Mutex<Option<ServiceConfig>>,
    health_poller: Arc<HealthPoller>,
    probe: Mutex<Option<Arc<PortProbe>>>,
}

impl GrpcServicePlugin {
    pub fn new(
        application_name: impl Into<String>,
        certificate_provider: Option<Arc<dyn CertificateProvider>>,
        rate_limit_gate: Option<Arc<dyn RateLimitGate>>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            certificate_provider,
            rate_limit_gate,
            config: Mutex::new(None),
            health_poller: Arc::new(HealthPoller::new()),
            probe: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Plugin for GrpcServicePlugin {
    fn name(&self) -> &str {
        "grpc-service"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "tonic server, middleware chain, health plane, and TLS for the process's gRPC service surface"
    }

    fn config_prefix(&self) -> &str {
        CONFIG_PREFIX
    }

    fn weight(&self) -> i32 {
        100
    }

    async fn initialize_resources(&mut self, runtime: &RuntimeHandle) -> Result<(), PluginError> {
        let service_config: ServiceConfig = runtime
            .config()
            .map_err(|e| PluginError::InitFailed(format!("failed to bind {CONFIG_PREFIX}: {e}")))?;
        config::validate(&service_config).map_err(|e| PluginError::InitFailed(e.to_string()))?;

        let tls = if service_config.tls_enable {
            let provider = self
                .certificate_provider
                .as_deref()
                .ok_or_else(|| PluginError::InitFailed("tls_enable is set but no certificate provider was supplied".to_string()))?;
            let tls = build_server_tls_config(&self.application_name, service_config.tls_auth_type, provider)
                .map_err(|e| PluginError::InitFailed(e.to_string()))?;
            Some(tls)
        } else {
            None
        };

        let registry = prometheus::Registry::new();
        let metrics = ServiceMetrics::register(&registry, &self.application_name)
            .map_err(|e| PluginError::InitFailed(format!("failed to register metrics: {e}")))?;

        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        let health_service = health_service
            .max_decoding_message_size(service_config.effective_max_recv_msg_size())
            .max_encoding_message_size(service_config.effective_max_send_msg_size());
        let health_service = BoxedHealthService::new(health_service);

        let shared = runtime.shared_resource_table();
        self.health_poller.start(shared, health_reporter).await;

        let server = Arc::new(GrpcManagedServer::new(
            service_config.clone(),
            tls,
            health_service,
            self.health_poller.clone(),
            metrics,
            self.application_name.clone(),
            self.rate_limit_gate.clone(),
        ));

        runtime
            .shared_set(SHARED_RESOURCE_KEY, server, std::mem::size_of::<GrpcManagedServer>())
            .await;

        if service_config.network == "tcp" {
            match PortProbe::new(&service_config.addr) {
                Ok(probe) => *self.probe.lock().await = Some(probe),
                Err(e) => runtime.log_warn(&format!("could not build a liveness probe for {}: {e}", service_config.addr)),
            }
        }

        *self.config.lock().await = Some(service_config);

        runtime.log_info("gRPC service plug-in resources initialized");
        Ok(())
    }

    async fn startup_tasks(&mut self, runtime: &RuntimeHandle) -> Result<(), PluginError> {
        runtime.log_info("gRPC service plug-in ready; the wire function owns running the server");
        Ok(())
    }

    async fn check_health(&self, _runtime: &RuntimeHandle) -> Result<(), PluginError> {
        let probe = self.probe.lock().await.clone();
        if let Some(probe) = probe {
            if !probe.is_reachable().await {
                return Err(PluginError::HealthCheckFailed("listener port is not reachable".to_string()));
            }
        }
        Ok(())
    }

    async fn cleanup_tasks(&mut self, runtime: &RuntimeHandle) -> Result<(), PluginError> {
        self.health_poller.stop().await;
        runtime.log_info("gRPC service plug-in cleaned up");
        Ok(())
    }

    /// Validates the replacement subtree before applying it. On failure the
    /// previously bound configuration is left untouched and an error is
    /// returned — the plug-in never adopts a rejected value.
    async fn configure(&mut self, raw: serde_json::Value, runtime: &RuntimeHandle) -> Result<(), PluginError> {
        let candidate: ServiceConfig = serde_json::from_value(raw).map_err(|e| PluginError::ConfigureRejected(e.to_string()))?;
        config::validate(&candidate).map_err(|e| PluginError::ConfigureRejected(e.to_string()))?;

        info!("grpc.service configuration update validated; restart required for listener-affecting changes to take effect");
        *self.config.lock().await = Some(candidate);
        runtime.log_info("gRPC service plug-in configuration updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_identity_matches_the_four_part_scheme() {
        let plugin = GrpcServicePlugin::new("test-app", None, None);
        assert_eq!(plugin.name(), "grpc-service");
        assert_eq!(plugin.config_prefix(), CONFIG_PREFIX);
    }
}
