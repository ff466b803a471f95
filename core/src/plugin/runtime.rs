use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ConfigHandle};

use super::resource::{ResourceStats, ResourceTable};

/// A lifecycle or diagnostic event broadcast to anything subscribed via
/// [`RuntimeHandle::subscribe_events`]. The manager itself never reads its
/// own emissions; this is purely a fan-out for interested plug-ins (e.g. a
/// metrics plug-in counting startups).
#[derive(Debug, Clone)]
pub struct PluginEvent {
    pub plugin_name: String,
    pub message: String,
}

/// The narrow capability surface handed to each plug-in. Plug-ins never see
/// the `Application` or `PluginManager` directly — only this — which is how
/// the kernel breaks the natural cyclic reference between application,
/// manager, and plug-in.
#[derive(Clone)]
pub struct RuntimeHandle {
    plugin_name: String,
    config: Arc<ConfigHandle>,
    config_prefix: String,
    shared: ResourceTable,
    private: ResourceTable,
    events: broadcast::Sender<PluginEvent>,
}

impl RuntimeHandle {
    pub(crate) fn new(
        plugin_name: String,
        config: Arc<ConfigHandle>,
        config_prefix: String,
        shared: ResourceTable,
        events: broadcast::Sender<PluginEvent>,
    ) -> Self {
        Self {
            plugin_name,
            config,
            config_prefix,
            shared,
            private: ResourceTable::new(),
            events,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Bind this plug-in's own configuration subtree (its declared
    /// `config_prefix`), applying `T`'s `serde` defaults for anything absent.
    pub fn config<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigError> {
        self.config.bind_or_default(&self.config_prefix)
    }

    pub fn config_required<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        self.config.bind(&self.config_prefix)
    }

    pub fn log_info(&self, message: &str) {
        info!(plugin = %self.plugin_name, "{message}");
    }

    pub fn log_warn(&self, message: &str) {
        warn!(plugin = %self.plugin_name, "{message}");
    }

    pub fn log_debug(&self, message: &str) {
        debug!(plugin = %self.plugin_name, "{message}");
    }

    pub fn emit(&self, message: impl Into<String>) {
        let _ = self.events.send(PluginEvent {
            plugin_name: self.plugin_name.clone(),
            message: message.into(),
        });
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    pub async fn shared_get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Option<T> {
        self.shared.get(name).await
    }

    pub async fn shared_set<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T, size_bytes: usize) {
        self.shared.set(name, value, size_bytes).await;
    }

    pub async fn private_get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Option<T> {
        self.private.get(name).await
    }

    pub async fn private_set<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T, size_bytes: usize) {
        self.private.set(name, value, size_bytes).await;
    }

    /// The process-wide shared resource table itself, for plug-ins that
    /// need to poll a published value in a background task rather than
    /// read it once (the gRPC service plug-in's health poller watches
    /// `required-upstreams-ready` this way).
    pub fn shared_resource_table(&self) -> ResourceTable {
        self.shared.clone()
    }

    /// Combined snapshot across this plug-in's private table and the
    /// process-wide shared table, the way `GetResourceStats` is documented
    /// to aggregate for the health checker.
    pub async fn resource_stats(&self) -> ResourceStats {
        let shared = self.shared.stats().await;
        let private = self.private.stats().await;
        ResourceStats {
            total_resources: shared.total_resources + private.total_resources,
            total_size_bytes: shared.total_size_bytes + private.total_size_bytes,
        }
    }
}
