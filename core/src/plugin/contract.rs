use async_trait::async_trait;

use super::runtime::RuntimeHandle;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("initialization failed: {0}")]
    InitFailed(String),

    #[error("startup failed: {0}")]
    StartupFailed(String),

    #[error("health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("cleanup failed: {0}")]
    CleanupFailed(String),

    #[error("plug-in {0} does not support hot configuration updates")]
    ConfigureUnsupported(String),

    #[error("configuration rejected: {0}")]
    ConfigureRejected(String),
}

/// The lifecycle contract every plug-in implements. The manager never calls
/// these directly on a trait object it owns outright — it always goes
/// through [`super::instance::PluginInstance`], which tracks state and
/// enforces the monotonic transitions.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;
    fn config_prefix(&self) -> &str;
    fn weight(&self) -> i32;

    fn dependencies(&self) -> &[String] {
        &[]
    }

    async fn initialize_resources(&mut self, runtime: &RuntimeHandle) -> Result<(), PluginError>;

    async fn startup_tasks(&mut self, runtime: &RuntimeHandle) -> Result<(), PluginError>;

    async fn check_health(&self, runtime: &RuntimeHandle) -> Result<(), PluginError>;

    async fn cleanup_tasks(&mut self, runtime: &RuntimeHandle) -> Result<(), PluginError>;

    /// Hot-update hook. The default rejects the update outright; plug-ins
    /// that support live reconfiguration override it and are responsible
    /// for validating the new value and rolling back their own state on
    /// failure (the manager does not retain a copy to roll back for them).
    async fn configure(&mut self, _raw: serde_json::Value, _runtime: &RuntimeHandle) -> Result<(), PluginError> {
        Err(PluginError::ConfigureUnsupported(self.name().to_string()))
    }
}
