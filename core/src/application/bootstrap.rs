use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use lynx_common::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use lynx_common::observability::{format_elapsed, init_logging, LoggingConfig};
use tracing::{info, warn};

use crate::config::{load_bootstrap_config_default, ConfigHandle};
use crate::error::BootstrapError;
use crate::health::HealthChecker;
use crate::plugin::{PluginManager, PluginRegistry, ResourceTable};

use super::managed_server::ManagedServer;
use super::shutdown::{run_shutdown_sequence, ShutdownInputs};
use super::signals::wait_for_shutdown_signal;

const DEFAULT_SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);

/// Opaque constructor producing the underlying server once plug-ins have
/// loaded. Receives the plug-in manager so it can pull resources (e.g. the
/// gRPC service plug-in's listener) published during `InitializeResources`.
pub type WireFn = Box<dyn FnOnce(Arc<PluginManager>) -> BoxFuture<'static, Result<Arc<dyn ManagedServer>, BootstrapError>> + Send>;

pub struct ApplicationBuilder {
    registry: PluginRegistry,
    wire: Option<WireFn>,
    shutdown_budget: Duration,
    cleanup: Option<Box<dyn FnOnce() + Send>>,
    startup_breaker_config: CircuitBreakerConfig,
}

impl ApplicationBuilder {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry,
            wire: None,
            shutdown_budget: DEFAULT_SHUTDOWN_BUDGET,
            cleanup: None,
            startup_breaker_config: CircuitBreakerConfig::default(),
        }
    }

    pub fn wire(mut self, wire: WireFn) -> Self {
        self.wire = Some(wire);
        self
    }

    pub fn shutdown_budget(mut self, budget: Duration) -> Self {
        self.shutdown_budget = budget;
        self
    }

    pub fn cleanup<F: FnOnce() + Send + 'static>(mut self, cleanup: F) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    pub fn startup_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.startup_breaker_config = config;
        self
    }

    pub fn build(self) -> Application {
        Application {
            registry: self.registry,
            wire: self.wire.expect("Application::build requires a wire function"),
            shutdown_budget: self.shutdown_budget,
            cleanup: self.cleanup,
            startup_breaker_config: self.startup_breaker_config,
        }
    }
}

/// The top-level coordinator: owns the config handle, the plug-in manager,
/// the startup breaker, the health checker, and the produced server, and
/// guarantees every one of them is released on every `run` exit path.
/// `run` takes `self` by value, so a second call to it is a compile-time
/// impossibility rather than a runtime guard — the strongest form of
/// "closes at most once".
pub struct Application {
    registry: PluginRegistry,
    wire: WireFn,
    shutdown_budget: Duration,
    cleanup: Option<Box<dyn FnOnce() + Send>>,
    startup_breaker_config: CircuitBreakerConfig,
}

impl Application {
    pub fn builder(registry: PluginRegistry) -> ApplicationBuilder {
        ApplicationBuilder::new(registry)
    }

    /// Boots, runs, and gracefully shuts down. A panic anywhere in the
    /// startup or run path is caught, converted to a `BootstrapError`,
    /// recorded against the startup breaker, and still runs shutdown —
    /// this is the single top-level recover point. Takes `self` by value:
    /// there is no second call to guard against.
    pub async fn run(self) -> Result<(), BootstrapError> {
        let registry = self.registry;
        let wire = self.wire;
        let shutdown_budget = self.shutdown_budget;
        let cleanup = Arc::new(StdMutex::new(self.cleanup));
        let breaker = CircuitBreaker::with_name("startup", self.startup_breaker_config.clone());

        let config = Arc::new(load_bootstrap_config_default()?);
        let shared_resources = ResourceTable::new();
        let manager = Arc::new(PluginManager::new(registry, config.clone(), shared_resources));

        init_logging(&LoggingConfig::new(config.name(), "info", false)).ok();

        info!(
            name = %config.name(),
            host = %config.host(),
            version = %config.version(),
            "=== lynx application starting ==="
        );

        let outcome = AssertUnwindSafe(Self::run_inner(
            manager.clone(),
            config.clone(),
            wire,
            breaker.clone(),
            shutdown_budget,
            cleanup.clone(),
        ))
        .catch_unwind()
        .await;

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic);
                warn!(panic = %message, "recovered panic during application run; unloading plug-ins defensively");
                breaker.record_failure().await;

                let health_checker = HealthChecker::new(manager.clone());
                let _ = run_shutdown_sequence(ShutdownInputs {
                    health_checker,
                    manager,
                    managed_server: None,
                    shutdown_budget,
                    cleanup: cleanup.lock().expect("cleanup mutex poisoned").take(),
                    config,
                })
                .await;

                Err(BootstrapError::PanicRecovered(message))
            }
        }
    }

    async fn run_inner(
        manager: Arc<PluginManager>,
        config: Arc<ConfigHandle>,
        wire: WireFn,
        breaker: CircuitBreaker,
        shutdown_budget: Duration,
        cleanup: Arc<StdMutex<Option<Box<dyn FnOnce() + Send>>>>,
    ) -> Result<(), BootstrapError> {
        let start = Instant::now();

        let load_result = breaker
            .call(async { manager.load_plugins().await.map_err(|e| BootstrapError::PluginLoad(e.to_string())) })
            .await;

        let report = match load_result {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => return Err(err),
            Err(CircuitBreakerError::Open) => return Err(BootstrapError::StartupBreakerOpen),
            Err(CircuitBreakerError::OperationFailed(err)) => return Err(err),
        };

        for failure in &report.failures {
            warn!(plugin = %failure.identifier, error = %failure.error, "plug-in failed to load");
        }
        info!(loaded = report.loaded.len(), failed = report.failures.len(), "plug-ins loaded");

        let managed_server = wire(manager.clone()).await?;

        let health_checker = HealthChecker::new(manager.clone());
        health_checker.start().await;

        info!(elapsed = %format_elapsed(start.elapsed()), "application ready");

        let server_for_run = managed_server.clone();
        let run_handle = tokio::spawn(async move { server_for_run.run().await });

        let shutdown_outcome = tokio::select! {
            _ = wait_for_shutdown_signal() => None,
            result = run_handle => Some(result.map_err(|e| BootstrapError::ServerRun(e.to_string())).and_then(|r| r)),
        };

        let shutdown_result = run_shutdown_sequence(ShutdownInputs {
            health_checker,
            manager,
            managed_server: Some(managed_server),
            shutdown_budget,
            cleanup: cleanup.lock().expect("cleanup mutex poisoned").take(),
            config,
        })
        .await;

        match shutdown_outcome {
            Some(Err(run_err)) => Err(run_err),
            _ => shutdown_result,
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
