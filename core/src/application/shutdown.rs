use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tracing::{error, info, warn};

use crate::config::ConfigHandle;
use crate::error::BootstrapError;
use crate::health::HealthChecker;
use crate::plugin::PluginManager;

use super::managed_server::ManagedServer;

pub(crate) struct ShutdownInputs {
    pub health_checker: Arc<HealthChecker>,
    pub manager: Arc<PluginManager>,
    pub managed_server: Option<Arc<dyn ManagedServer>>,
    pub shutdown_budget: Duration,
    pub cleanup: Option<Box<dyn FnOnce() + Send>>,
    pub config: Arc<ConfigHandle>,
}

/// Runs the four-step graceful shutdown order — stop server, stop health
/// checker, unload plug-ins, run user cleanup, flush loggers — with each
/// step panic-guarded so a failure in one never skips the rest. Returns
/// the first error encountered, after every step has still run.
pub(crate) async fn run_shutdown_sequence(inputs: ShutdownInputs) -> Result<(), BootstrapError> {
    let start = Instant::now();
    info!("initiating graceful shutdown");

    let mut outcome: Result<(), BootstrapError> = Ok(());

    if let Some(server) = inputs.managed_server {
        let budget = inputs.shutdown_budget;
        match tokio::time::timeout(budget, server.stop(budget)).await {
            Ok(Ok(())) => info!("underlying server stopped cleanly"),
            Ok(Err(err)) => {
                warn!(error = %err, "underlying server reported a stop error");
                outcome = outcome.and(Err(BootstrapError::ServerStop(err.to_string())));
            }
            Err(_) => {
                error!(budget_ms = budget.as_millis(), "graceful shutdown exceeded its budget");
                outcome = outcome.and(Err(BootstrapError::ShutdownTimeout(budget)));
            }
        }
    }

    let health_checker = inputs.health_checker.clone();
    if let Err(_panic) = AssertUnwindSafe(async { health_checker.stop().await }).catch_unwind().await {
        error!("panic while stopping health checker");
    }

    let manager = inputs.manager.clone();
    if let Err(_panic) = AssertUnwindSafe(async { manager.unload_plugins().await }).catch_unwind().await {
        error!("panic while unloading plug-ins");
    }

    if let Some(cleanup) = inputs.cleanup {
        if std::panic::catch_unwind(AssertUnwindSafe(cleanup)).is_err() {
            error!("panic in user-supplied cleanup closure");
        }
    }

    inputs.config.close();
    lynx_common::observability::shutdown_logging();

    info!(elapsed_ms = start.elapsed().as_millis(), "graceful shutdown complete");
    outcome
}
