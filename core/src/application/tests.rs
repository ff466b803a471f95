use std::io::Write as _;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::TEST_ENV_GUARD;
use crate::config::CONFIG_PATH_ENV_VAR;
use crate::plugin::PluginRegistry;

use super::bootstrap::Application;
use super::managed_server::ManagedServer;
use crate::error::BootstrapError;

struct FakeServer {
    run_delay: Duration,
}

#[async_trait]
impl ManagedServer for FakeServer {
    async fn run(&self) -> Result<(), BootstrapError> {
        tokio::time::sleep(self.run_delay).await;
        Ok(())
    }

    async fn stop(&self, _deadline: Duration) -> Result<(), BootstrapError> {
        Ok(())
    }
}

fn write_test_config() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut f = std::fs::File::create(dir.path().join("application.yaml")).unwrap();
    f.write_all(b"application:\n  name: svc\n  version: \"1.0.0\"\n  host: h\n").unwrap();
    dir
}

#[tokio::test]
async fn boot_run_shutdown_completes_once_the_server_run_loop_returns() {
    let _guard = TEST_ENV_GUARD.lock().unwrap();
    let dir = write_test_config();
    std::env::set_var(CONFIG_PATH_ENV_VAR, dir.path());

    let app = Application::builder(PluginRegistry::new())
        .wire(Box::new(|_manager| {
            Box::pin(async move {
                let server: std::sync::Arc<dyn ManagedServer> = std::sync::Arc::new(FakeServer {
                    run_delay: Duration::from_millis(20),
                });
                Ok(server)
            })
        }))
        .shutdown_budget(Duration::from_secs(1))
        .build();

    let result = app.run().await;
    std::env::remove_var(CONFIG_PATH_ENV_VAR);

    assert!(result.is_ok(), "expected clean shutdown, got {result:?}");
}

#[tokio::test]
async fn missing_application_name_surfaces_as_config_invalid() {
    let _guard = TEST_ENV_GUARD.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut f = std::fs::File::create(dir.path().join("application.yaml")).unwrap();
    f.write_all(b"application:\n  version: \"1.0.0\"\n").unwrap();
    std::env::set_var(CONFIG_PATH_ENV_VAR, dir.path());

    let app = Application::builder(PluginRegistry::new())
        .wire(Box::new(|_manager| {
            Box::pin(async move {
                let server: std::sync::Arc<dyn ManagedServer> = std::sync::Arc::new(FakeServer {
                    run_delay: Duration::from_millis(5),
                });
                Ok(server)
            })
        }))
        .build();

    let result = app.run().await;
    std::env::remove_var(CONFIG_PATH_ENV_VAR);

    assert!(matches!(result, Err(BootstrapError::ConfigInvalid(_))));
}
