use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::constants::*;

/// Distinguishable failure modes for bootstrap configuration loading,
/// matching spec's `ConfigInvalid` error kind plus the layers it crosses.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("bootstrap configuration path not resolved: {0}")]
    MissingPath(String),

    #[error("failed to read configuration source at {path}: {source}")]
    UnreadableSource {
        path: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("failed to parse configuration: {0}")]
    ParseError(#[source] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(String),

    #[error("failed to bind configuration subtree {prefix}: {source}")]
    Bind {
        prefix: String,
        #[source]
        source: config::ConfigError,
    },
}

/// A loaded bootstrap configuration document, scoped "acquire on load /
/// release on teardown": `close` is idempotent and must be called on every
/// `Run` exit path, including a recovered panic.
pub struct ConfigHandle {
    inner: Arc<config::Config>,
    path: PathBuf,
    closed: AtomicBool,
}

impl ConfigHandle {
    pub(crate) fn new(inner: config::Config, path: PathBuf) -> Self {
        Self {
            inner: Arc::new(inner),
            path,
            closed: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.inner.get_string(key).ok()
    }

    /// Bind a dotted-path subtree to a typed struct, the way each plug-in's
    /// `InitializeResources` pulls its own configuration prefix.
    pub fn bind<T: DeserializeOwned>(&self, prefix: &str) -> Result<T, ConfigError> {
        self.inner.get::<T>(prefix).map_err(|source| ConfigError::Bind {
            prefix: prefix.to_string(),
            source,
        })
    }

    /// Bind a subtree, falling back to `T::default()` when the prefix is
    /// entirely absent (a plug-in with no configured section still gets
    /// sane defaults).
    pub fn bind_or_default<T: DeserializeOwned + Default>(&self, prefix: &str) -> Result<T, ConfigError> {
        match self.inner.get::<T>(prefix) {
            Ok(value) => Ok(value),
            Err(config::ConfigError::NotFound(_)) => Ok(T::default()),
            Err(source) => Err(ConfigError::Bind {
                prefix: prefix.to_string(),
                source,
            }),
        }
    }

    pub fn name(&self) -> String {
        self.get_string(KEY_APPLICATION_NAME)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_string())
    }

    pub fn host(&self) -> String {
        self.get_string(KEY_APPLICATION_HOST)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_APPLICATION_HOST.to_string())
    }

    pub fn version(&self) -> String {
        self.get_string(KEY_APPLICATION_VERSION)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_APPLICATION_VERSION.to_string())
    }

    /// Release the scoped resource. Safe to call more than once; only the
    /// first call logs and takes effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(path = %self.path.display(), "bootstrap configuration handle released");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ConfigHandle {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            warn!(
                path = %self.path.display(),
                "bootstrap configuration handle dropped without being explicitly closed"
            );
        }
    }
}
