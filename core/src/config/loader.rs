use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::{debug, info};

use super::constants::*;
use super::manager::ConfigPathManager;
use super::types::{ConfigError, ConfigHandle};

/// Resolve the bootstrap configuration root, in precedence order:
/// explicit path (from `--conf`, via [`ConfigPathManager`]) > `LYNX_CONFIG_PATH`
/// env var > [`DEFAULT_CONFIG_PATH`].
pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    let manager = ConfigPathManager::global();

    let raw = if let Some(flag_path) = manager.get_config_path() {
        debug!(path = %flag_path, "using configuration path from --conf flag");
        flag_path
    } else if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV_VAR) {
        debug!(path = %env_path, source = CONFIG_PATH_ENV_VAR, "using configuration path from environment");
        env_path
    } else {
        debug!(path = DEFAULT_CONFIG_PATH, "using default configuration path");
        DEFAULT_CONFIG_PATH.to_string()
    };

    if raw.trim().is_empty() {
        return Err(ConfigError::MissingPath(ERR_EMPTY_PATH.to_string()));
    }

    Ok(PathBuf::from(raw))
}

/// Load and validate the bootstrap configuration document. Layers, lowest
/// to highest precedence: the YAML file(s) rooted at `path`, then
/// `LYNX__`-prefixed environment variables with `__` as the nesting
/// separator (so `LYNX__APPLICATION__HOST` overrides `application.host`).
pub fn load_bootstrap_config(path: &Path) -> Result<ConfigHandle, ConfigError> {
    let path_str = path.to_string_lossy().to_string();

    let builder = Config::builder()
        .add_source(File::from(path.to_path_buf()).required(false))
        .add_source(
            Environment::with_prefix("LYNX")
                .separator("__")
                .try_parsing(true),
        );

    let built = builder.build().map_err(|source| ConfigError::UnreadableSource {
        path: path_str.clone(),
        source,
    })?;

    validate(&built)?;

    info!(path = %path.display(), "bootstrap configuration loaded");
    Ok(ConfigHandle::new(built, path.to_path_buf()))
}

/// Resolve the path and load in one call — what `Application::Run` invokes.
pub fn load_bootstrap_config_default() -> Result<ConfigHandle, ConfigError> {
    let path = resolve_config_path()?;
    load_bootstrap_config(&path)
}

fn validate(built: &Config) -> Result<(), ConfigError> {
    let name = built.get_string(KEY_APPLICATION_NAME).unwrap_or_default();
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(ERR_MISSING_NAME.to_string()));
    }

    let version = built.get_string(KEY_APPLICATION_VERSION).unwrap_or_default();
    if version.trim().is_empty() {
        return Err(ConfigError::Validation(ERR_MISSING_VERSION.to_string()));
    }

    Ok(())
}
