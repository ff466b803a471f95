use std::collections::HashMap;

use super::contract::Plugin;
use super::identity::PluginIdentity;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("plugin identifier {0:?} is already registered")]
    DuplicateIdentifier(String),
}

type Constructor = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

struct RegistryEntry {
    config_prefix: String,
    constructor: Constructor,
}

/// Process-wide typed factory: plug-in modules register a constructor once
/// at process init, keyed by the plug-in's four-part identifier. The
/// manager consults this to instantiate plug-ins on `LoadPlugins` without
/// needing compile-time knowledge of every plug-in crate.
#[derive(Default)]
pub struct PluginRegistry {
    entries: HashMap<String, RegistryEntry>,
    order: Vec<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor. Returns an error — never panics or
    /// silently overwrites — when the identifier was already registered.
    pub fn register<F>(&mut self, identity: &PluginIdentity, config_prefix: impl Into<String>, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let key = identity.as_str().to_string();
        if self.entries.contains_key(&key) {
            return Err(RegistryError::DuplicateIdentifier(key));
        }
        self.entries.insert(
            key.clone(),
            RegistryEntry {
                config_prefix: config_prefix.into(),
                constructor: Box::new(constructor),
            },
        );
        self.order.push(key);
        Ok(())
    }

    pub fn is_registered(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn config_prefix_of(&self, identifier: &str) -> Option<&str> {
        self.entries.get(identifier).map(|e| e.config_prefix.as_str())
    }

    pub fn construct(&self, identifier: &str) -> Option<Box<dyn Plugin>> {
        self.entries.get(identifier).map(|e| (e.constructor)())
    }

    /// Registration order, used to break weight ties deterministically.
    pub fn registration_order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::contract::PluginError;
    use crate::plugin::runtime::RuntimeHandle;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Plugin for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn description(&self) -> &str {
            ""
        }
        fn config_prefix(&self) -> &str {
            "noop"
        }
        fn weight(&self) -> i32 {
            0
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

    #[test]
    fn duplicate_identifier_registration_is_rejected() {
        let identity = PluginIdentity::parse("lynx.plugin.noop.1").unwrap();
        let mut registry = PluginRegistry::new();
        registry.register(&identity, "noop", || Box::new(Noop)).unwrap();

        let err = registry.register(&identity, "noop", || Box::new(Noop)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateIdentifier("lynx.plugin.noop.1".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn construct_builds_a_fresh_instance_each_call() {
        let identity = PluginIdentity::parse("lynx.plugin.noop.1").unwrap();
        let mut registry = PluginRegistry::new();
        registry.register(&identity, "noop", || Box::new(Noop)).unwrap();

        let a = registry.construct("lynx.plugin.noop.1");
        assert!(a.is_some());
        assert!(registry.is_registered("lynx.plugin.noop.1"));
        assert!(!registry.is_registered("lynx.plugin.other.1"));
    }
}
