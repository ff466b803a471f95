use std::sync::{OnceLock, RwLock};

use super::constants::DEFAULT_CONFIG_PATH;

/// Process-wide configuration path manager. The CLI flag parser calls
/// `set_config_path` once at startup; everything else (including test code
/// that skips flag parsing) reads through this singleton so the resolution
/// precedence in `load_bootstrap_config` has one source of truth.
pub struct ConfigPathManager {
    path: RwLock<Option<String>>,
}

impl ConfigPathManager {
    fn new() -> Self {
        Self {
            path: RwLock::new(None),
        }
    }

    pub fn global() -> &'static ConfigPathManager {
        static INSTANCE: OnceLock<ConfigPathManager> = OnceLock::new();
        INSTANCE.get_or_init(ConfigPathManager::new)
    }

    pub fn set_config_path(&self, path: impl Into<String>) {
        let mut guard = self.path.write().expect("config path lock poisoned");
        *guard = Some(path.into());
    }

    pub fn get_config_path(&self) -> Option<String> {
        self.path.read().expect("config path lock poisoned").clone()
    }

    pub fn is_config_path_set(&self) -> bool {
        self.path.read().expect("config path lock poisoned").is_some()
    }

    pub fn get_default_config_path(&self) -> &'static str {
        DEFAULT_CONFIG_PATH
    }

    /// Test-only: clear the singleton so independent tests don't leak state
    /// into one another.
    #[cfg(test)]
    pub fn reset(&self) {
        let mut guard = self.path.write().expect("config path lock poisoned");
        *guard = None;
    }
}
