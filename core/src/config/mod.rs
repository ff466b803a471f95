//! Bootstrap configuration: path resolution, YAML + environment overlay,
//! and the scoped [`ConfigHandle`] every plug-in binds its own subtree from.

mod constants;
mod loader;
mod manager;
mod types;

#[cfg(test)]
mod tests;

/// Shared across every test in the crate that mutates process env vars or
/// the `ConfigPathManager` singleton, so they don't race each other under
/// the default parallel test runner.
#[cfg(test)]
pub(crate) static TEST_ENV_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());

pub use constants::{CONFIG_PATH_ENV_VAR, DEFAULT_CONFIG_PATH, TEST_MODE_ENV_VAR};
pub use loader::{load_bootstrap_config, load_bootstrap_config_default, resolve_config_path};
pub use manager::ConfigPathManager;
pub use types::{ConfigError, ConfigHandle};
