use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures_util::FutureExt;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::plugin::PluginManager;

use super::types::{
    HealthSnapshot, DEFAULT_CHECK_INTERVAL, RESOURCE_COUNT_WARN_THRESHOLD, RESOURCE_SIZE_WARN_THRESHOLD_BYTES,
    UNLOAD_FAILURE_STALE_AFTER,
};

/// Periodic background probe over the plug-in manager's failure log and
/// resource counters. Runs on a ticker until `stop` is called; `stop` is
/// safe to call more than once (the cancellation token absorbs repeats).
pub struct HealthChecker {
    manager: Arc<PluginManager>,
    interval: Duration,
    state: RwLock<HealthSnapshot>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthChecker {
    pub fn new(manager: Arc<PluginManager>) -> Arc<Self> {
        Self::with_interval(manager, DEFAULT_CHECK_INTERVAL)
    }

    pub fn with_interval(manager: Arc<PluginManager>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            manager,
            interval,
            state: RwLock::new(HealthSnapshot::default()),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// Starts the ticker task. Idempotent: calling twice on an
    /// already-running checker is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut guard = self.task.lock().await;
        if guard.is_some() {
            return;
        }

        let checker = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(checker.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = checker.cancel.cancelled() => break,
                    _ = ticker.tick() => checker.run_once().await,
                }
            }
        });
        *guard = Some(handle);
    }

    /// Signals the ticker to stop and awaits its exit. Safe to call
    /// multiple times or from multiple tasks concurrently.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub async fn is_healthy(&self) -> bool {
        self.state.read().await.healthy
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        self.state.read().await.clone()
    }

    async fn run_once(&self) {
        let outcome = AssertUnwindSafe(self.evaluate()).catch_unwind().await;

        let mut state = self.state.write().await;
        state.last_check = Some(SystemTime::now());

        match outcome {
            Ok((healthy, warnings)) => {
                state.healthy = healthy;
                state.warnings = warnings;
            }
            Err(_) => {
                error!("health check panicked; marking unhealthy");
                state.healthy = false;
                state.warnings = vec!["health check panicked".to_string()];
            }
        }
    }

    async fn evaluate(&self) -> (bool, Vec<String>) {
        let mut healthy = true;
        let mut warnings = Vec::new();

        let now = SystemTime::now();
        let unload_failures = self.manager.get_unload_failures().await;
        let has_recent_failure = unload_failures.iter().any(|f| {
            now.duration_since(f.at)
                .map(|age| age < UNLOAD_FAILURE_STALE_AFTER)
                .unwrap_or(true)
        });
        if has_recent_failure {
            healthy = false;
            warnings.push("recent plug-in unload failure".to_string());
        }

        let stats = self.manager.get_resource_stats().await;
        if stats.total_resources > RESOURCE_COUNT_WARN_THRESHOLD {
            let msg = format!("resource count {} exceeds warn threshold", stats.total_resources);
            warn!("{msg}");
            warnings.push(msg);
        }
        if stats.total_size_bytes > RESOURCE_SIZE_WARN_THRESHOLD_BYTES {
            let msg = format!("resource size {} bytes exceeds warn threshold (possible leak)", stats.total_size_bytes);
            warn!("{msg}");
            warnings.push(msg);
        }

        (healthy, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_bootstrap_config;
    use crate::plugin::{PluginManager, PluginRegistry, ResourceTable};
    use std::io::Write as _;

    fn test_config() -> Arc<crate::config::ConfigHandle> {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("application.yaml")).unwrap();
        f.write_all(b"application:\n  name: svc\n  version: \"1.0.0\"\n").unwrap();
        Arc::new(load_bootstrap_config(dir.path()).unwrap())
    }

    #[tokio::test]
    async fn healthy_with_no_plugins_and_no_failures() {
        let manager = Arc::new(PluginManager::new(PluginRegistry::new(), test_config(), ResourceTable::new()));
        let checker = HealthChecker::new(manager);
        checker.run_once().await;
        assert!(checker.is_healthy().await);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let manager = Arc::new(PluginManager::new(PluginRegistry::new(), test_config(), ResourceTable::new()));
        let checker = HealthChecker::with_interval(manager, Duration::from_millis(10));
        checker.start().await;
        checker.start().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        checker.stop().await;
        checker.stop().await;
    }
}
