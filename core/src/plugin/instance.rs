use tokio::sync::{Mutex, RwLock};

use super::contract::{Plugin, PluginError};
use super::descriptor::PluginDescriptor;
use super::identity::PluginIdentity;
use super::runtime::RuntimeHandle;

/// Lifecycle state of a loaded plug-in. Transitions are monotonic except
/// `Started` ↔ `Degraded`, which a failing health check can flip back and
/// forth indefinitely without tearing the plug-in down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Created,
    Initialized,
    Started,
    Degraded,
    Destroyed,
}

/// A loaded plug-in paired with its descriptor, identity, runtime handle,
/// and current lifecycle state. Owned exclusively by the [`super::manager::PluginManager`].
pub struct PluginInstance {
    identity: PluginIdentity,
    descriptor: PluginDescriptor,
    runtime: RuntimeHandle,
    plugin: Mutex<Box<dyn Plugin>>,
    state: RwLock<PluginState>,
}

impl PluginInstance {
    pub(crate) fn new(identity: PluginIdentity, descriptor: PluginDescriptor, runtime: RuntimeHandle, plugin: Box<dyn Plugin>) -> Self {
        Self {
            identity,
            descriptor,
            runtime,
            plugin: Mutex::new(plugin),
            state: RwLock::new(PluginState::Created),
        }
    }

    pub fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    pub async fn state(&self) -> PluginState {
        *self.state.read().await
    }

    pub(crate) async fn initialize(&self) -> Result<(), PluginError> {
        let mut plugin = self.plugin.lock().await;
        plugin.initialize_resources(&self.runtime).await?;
        *self.state.write().await = PluginState::Initialized;
        Ok(())
    }

    pub(crate) async fn start(&self) -> Result<(), PluginError> {
        let mut plugin = self.plugin.lock().await;
        plugin.startup_tasks(&self.runtime).await?;
        *self.state.write().await = PluginState::Started;
        Ok(())
    }

    /// Runs the plug-in's own health probe and flips `Started`/`Degraded`
    /// accordingly. Never transitions to `Destroyed` — that only happens
    /// via explicit `cleanup`.
    pub(crate) async fn check_health(&self) -> Result<(), PluginError> {
        let plugin = self.plugin.lock().await;
        let result = plugin.check_health(&self.runtime).await;
        let mut state = self.state.write().await;
        if *state == PluginState::Destroyed {
            return result;
        }
        *state = if result.is_ok() { PluginState::Started } else { PluginState::Degraded };
        result
    }

    pub(crate) async fn cleanup(&self) -> Result<(), PluginError> {
        let mut plugin = self.plugin.lock().await;
        let result = plugin.cleanup_tasks(&self.runtime).await;
        *self.state.write().await = PluginState::Destroyed;
        result
    }

    pub(crate) async fn configure(&self, raw: serde_json::Value) -> Result<(), PluginError> {
        let mut plugin = self.plugin.lock().await;
        plugin.configure(raw, &self.runtime).await
    }
}
