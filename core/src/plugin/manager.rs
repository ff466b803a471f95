use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use crate::config::ConfigHandle;

use super::contract::PluginError;
use super::identity::PluginIdentity;
use super::instance::PluginInstance;
use super::registry::PluginRegistry;
use super::resource::{ResourceStats, ResourceTable};
use super::runtime::{PluginEvent, RuntimeHandle};

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("dependency cycle detected among pending plug-ins: {0:?}")]
    DependencyCycle(Vec<String>),
}

/// One plug-in's init/startup outcome during a `LoadPlugins` call.
#[derive(Debug)]
pub struct LoadFailure {
    pub identifier: String,
    pub error: PluginError,
}

/// An `UnloadPlugins` cleanup failure, timestamped so the health checker
/// can treat only recent ones as live (within 5 minutes).
#[derive(Debug, Clone)]
pub struct UnloadFailure {
    pub identifier: String,
    pub error: String,
    pub at: SystemTime,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped_duplicates: Vec<String>,
    pub failures: Vec<LoadFailure>,
}

/// Orders plug-ins by declared weight (desc) and dependency, deduplicates
/// by identifier, drives the lifecycle phases, and tracks unload failures
/// and resource stats for the health checker.
pub struct PluginManager {
    registry: PluginRegistry,
    config: Arc<ConfigHandle>,
    shared_resources: ResourceTable,
    events: broadcast::Sender<PluginEvent>,
    loaded_order: RwLock<Vec<Arc<PluginInstance>>>,
    loaded_by_id: RwLock<HashMap<String, Arc<PluginInstance>>>,
    unload_failures: RwLock<Vec<UnloadFailure>>,
}

impl PluginManager {
    pub fn new(registry: PluginRegistry, config: Arc<ConfigHandle>, shared_resources: ResourceTable) -> Self {
        let (events, _rx) = broadcast::channel(256);
        Self {
            registry,
            config,
            shared_resources,
            events,
            loaded_order: RwLock::new(Vec::new()),
            loaded_by_id: RwLock::new(HashMap::new()),
            unload_failures: RwLock::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Loads every registered plug-in not already loaded, in weight-desc /
    /// dependency order. Safe to call repeatedly: already-loaded
    /// identifiers are skipped, never reloaded or duplicated.
    pub async fn load_plugins(&self) -> Result<LoadReport, ManagerError> {
        let already_loaded: HashSet<String> = self.loaded_by_id.read().await.keys().cloned().collect();

        let pending: Vec<String> = self
            .registry
            .registration_order()
            .iter()
            .filter(|id| !already_loaded.contains(*id))
            .cloned()
            .collect();

        let mut report = LoadReport::default();
        if pending.is_empty() {
            return Ok(report);
        }

        let order = self.resolve_load_order(&pending)?;

        for identifier in order {
            let Some(plugin) = self.registry.construct(&identifier) else {
                continue;
            };
            let config_prefix = self.registry.config_prefix_of(&identifier).unwrap_or_default().to_string();
            let plugin_name = plugin.name().to_string();

            let runtime = RuntimeHandle::new(
                plugin_name.clone(),
                self.config.clone(),
                config_prefix,
                self.shared_resources.clone(),
                self.events.clone(),
            );

            let identity = match PluginIdentity::parse(&identifier) {
                Ok(identity) => identity,
                Err(err) => {
                    report.failures.push(LoadFailure {
                        identifier: identifier.clone(),
                        error: PluginError::InitFailed(err.to_string()),
                    });
                    continue;
                }
            };
            let descriptor = super::descriptor::PluginDescriptor::builder(identity.clone(), plugin_name.clone())
                .version(plugin.version().to_string())
                .description(plugin.description().to_string())
                .config_prefix(plugin.config_prefix().to_string())
                .weight(plugin.weight())
                .build();

            let instance = Arc::new(PluginInstance::new(identity, descriptor, runtime, plugin));

            match instance.initialize().await {
                Ok(()) => {}
                Err(err) => {
                    report.failures.push(LoadFailure { identifier: identifier.clone(), error: err });
                    continue;
                }
            }

            if let Err(err) = instance.start().await {
                report.failures.push(LoadFailure { identifier: identifier.clone(), error: err });
                continue;
            }

            info!(plugin = %instance.descriptor().name(), weight = instance.descriptor().weight(), "plug-in started");
            self.loaded_by_id.write().await.insert(identifier.clone(), instance.clone());
            self.loaded_order.write().await.push(instance);
            report.loaded.push(identifier);
        }

        Ok(report)
    }

    /// Tears down every loaded plug-in in reverse load order. Failures are
    /// recorded but never abort the loop.
    pub async fn unload_plugins(&self) {
        let order: Vec<Arc<PluginInstance>> = {
            let mut guard = self.loaded_order.write().await;
            std::mem::take(&mut *guard)
        };

        for instance in order.into_iter().rev() {
            let identifier = instance.identity().as_str().to_string();
            if let Err(err) = instance.cleanup().await {
                warn!(plugin = %instance.descriptor().name(), error = %err, "plug-in cleanup failed");
                self.unload_failures.write().await.push(UnloadFailure {
                    identifier: identifier.clone(),
                    error: err.to_string(),
                    at: SystemTime::now(),
                });
            } else {
                info!(plugin = %instance.descriptor().name(), "plug-in unloaded");
            }
            self.loaded_by_id.write().await.remove(&identifier);
        }
    }

    pub async fn get_unload_failures(&self) -> Vec<UnloadFailure> {
        self.unload_failures.read().await.clone()
    }

    pub async fn get_resource_stats(&self) -> ResourceStats {
        self.shared_resources.stats().await
    }

    /// Read a value a plug-in published into the process-wide shared
    /// resource table during `InitializeResources`. Used by the wire
    /// function to pull out whatever handle a service plug-in exposes
    /// (listener config, health reporter, ...) without the bootstrap
    /// crate depending on that plug-in's concrete type.
    pub async fn shared_resource<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Option<T> {
        self.shared_resources.get(name).await
    }

    pub async fn loaded_identifiers(&self) -> Vec<String> {
        self.loaded_order.read().await.iter().map(|i| i.identity().as_str().to_string()).collect()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    /// Kahn's algorithm biased toward higher weight: among all
    /// dependency-ready candidates, always pick the highest weight, ties
    /// broken by registration order. Dependencies on identifiers outside
    /// `pending` (already loaded in a prior cycle) are treated as
    /// immediately satisfied.
    fn resolve_load_order(&self, pending: &[String]) -> Result<Vec<String>, ManagerError> {
        let pending_set: HashSet<&String> = pending.iter().collect();
        let registration_index: HashMap<&String, usize> =
            self.registry.registration_order().iter().enumerate().map(|(i, id)| (id, i)).collect();

        // Probe each candidate's metadata once up front; constructors are
        // expected to be cheap and side-effect-free until `initialize_resources`.
        let metadata: HashMap<String, (i32, Vec<String>)> = pending
            .iter()
            .filter_map(|id| self.registry.construct(id).map(|p| (id.clone(), (p.weight(), p.dependencies().to_vec()))))
            .collect();

        let mut remaining: Vec<String> = pending.to_vec();
        let mut resolved = Vec::with_capacity(pending.len());
        let mut resolved_set: HashSet<String> = HashSet::new();

        while !remaining.is_empty() {
            let mut ready: Vec<String> = remaining
                .iter()
                .filter(|id| {
                    metadata
                        .get(*id)
                        .map(|(_, deps)| deps.iter().all(|dep| resolved_set.contains(dep) || !pending_set.contains(dep)))
                        .unwrap_or(true)
                })
                .cloned()
                .collect();

            if ready.is_empty() {
                error!(pending = ?remaining, "plug-in dependency cycle detected");
                return Err(ManagerError::DependencyCycle(remaining));
            }

            ready.sort_by(|a, b| {
                let weight_a = metadata.get(a).map(|(w, _)| *w).unwrap_or(0);
                let weight_b = metadata.get(b).map(|(w, _)| *w).unwrap_or(0);
                weight_b
                    .cmp(&weight_a)
                    .then_with(|| registration_index.get(a).cmp(&registration_index.get(b)))
            });

            let next = ready.remove(0);
            remaining.retain(|id| id != &next);
            resolved_set.insert(next.clone());
            resolved.push(next);
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_bootstrap_config;
    use async_trait::async_trait;
    use std::io::Write as _;

    struct Weighted {
        name: &'static str,
        weight: i32,
        deps: Vec<String>,
    }

    #[async_trait]
    impl super::super::contract::Plugin for Weighted {
        fn name(&self) -> &str {
            self.name
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn description(&self) -> &str {
            ""
        }
        fn config_prefix(&self) -> &str {
            self.name
        }
        fn weight(&self) -> i32 {
            self.weight
        }
        fn dependencies(&self) -> &[String] {
            &self.deps
        }
        async fn initialize_resources(&mut self, _runtime: &RuntimeHandle) -> Result<(), PluginError> {
            Ok(())
        }
        async fn startup_tasks(&mut self, _runtime: &RuntimeHandle) -> Result<(), PluginError> {
            Ok(())
        }
        async fn check_health(&self, _runtime: &RuntimeHandle) -> Result<(), PluginError> {
            Ok(())
        }
        async fn cleanup_tasks(&mut self, _runtime: &RuntimeHandle) -> Result<(), PluginError> {
            Ok(())
        }
    }

    fn test_config() -> Arc<ConfigHandle> {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("application.yaml")).unwrap();
        f.write_all(b"application:\n  name: svc\n  version: \"1.0.0\"\n").unwrap();
        Arc::new(load_bootstrap_config(dir.path()).unwrap())
    }

    #[tokio::test]
    async fn load_order_is_weight_descending_and_unload_reverses_it() {
        let mut registry = PluginRegistry::new();
        let a = PluginIdentity::parse("lynx.plugin.a.1").unwrap();
        let b = PluginIdentity::parse("lynx.plugin.b.1").unwrap();
        let c = PluginIdentity::parse("lynx.plugin.c.1").unwrap();
        registry.register(&a, "a", || Box::new(Weighted { name: "a", weight: 5, deps: vec![] })).unwrap();
        registry.register(&b, "b", || Box::new(Weighted { name: "b", weight: 20, deps: vec![] })).unwrap();
        registry.register(&c, "c", || Box::new(Weighted { name: "c", weight: 10, deps: vec![] })).unwrap();

        let manager = PluginManager::new(registry, test_config(), ResourceTable::new());
        let report = manager.load_plugins().await.unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.loaded, vec!["lynx.plugin.b.1", "lynx.plugin.c.1", "lynx.plugin.a.1"]);

        manager.unload_plugins().await;
        assert!(manager.loaded_identifiers().await.is_empty());
    }

    #[tokio::test]
    async fn reloading_skips_already_loaded_identifiers() {
        let mut registry = PluginRegistry::new();
        let a = PluginIdentity::parse("lynx.plugin.a.1").unwrap();
        registry.register(&a, "a", || Box::new(Weighted { name: "a", weight: 1, deps: vec![] })).unwrap();

        let manager = PluginManager::new(registry, test_config(), ResourceTable::new());
        let first = manager.load_plugins().await.unwrap();
        assert_eq!(first.loaded.len(), 1);

        let second = manager.load_plugins().await.unwrap();
        assert!(second.loaded.is_empty());
        assert_eq!(manager.loaded_identifiers().await.len(), 1);
    }

    #[tokio::test]
    async fn dependency_order_is_respected_even_against_weight() {
        let low = PluginIdentity::parse("lynx.plugin.low.1").unwrap();
        let high = PluginIdentity::parse("lynx.plugin.high.1").unwrap();

        let mut registry = PluginRegistry::new();
        registry.register(&low, "low", || Box::new(Weighted { name: "low", weight: 1, deps: vec![] })).unwrap();
        registry
            .register(&high, "high", || {
                Box::new(Weighted {
                    name: "high",
                    weight: 100,
                    deps: vec!["lynx.plugin.low.1".to_string()],
                })
            })
            .unwrap();

        let manager = PluginManager::new(registry, test_config(), ResourceTable::new());
        let report = manager.load_plugins().await.unwrap();
        assert_eq!(report.loaded, vec!["lynx.plugin.low.1", "lynx.plugin.high.1"]);
    }
}
