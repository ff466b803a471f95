use std::time::Duration;

use lynx_core::plugin::{ResourceTable, REQUIRED_UPSTREAMS_READY};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic_health::server::HealthReporter;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const POLL_ITERATION_TIMEOUT: Duration = Duration::from_secs(1);
const COMPLETION_WAIT: Duration = Duration::from_millis(50);

/// The overall server health, reported under the empty service name per
/// the gRPC health checking protocol's "whole server" convention.
pub struct OverallService;

impl tonic::server::NamedService for OverallService {
    const NAME: &'static str = "";
}

/// Background poller that slaves the health reporter's SERVING /
/// NOT_SERVING status to the `required-upstreams-ready` shared resource.
pub struct HealthPoller {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthPoller {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub async fn start(&self, shared: ResourceTable, mut reporter: HealthReporter) {
        let mut guard = self.task.lock().await;
        if guard.is_some() {
            return;
        }

        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let started = tokio::time::Instant::now();
                let ready = match tokio::time::timeout(POLL_ITERATION_TIMEOUT, shared.required_upstreams_ready()).await {
                    Ok(value) => value,
                    Err(_) => {
                        debug!("required-upstreams-ready poll timed out this tick");
                        continue;
                    }
                };
                if started.elapsed() > COMPLETION_WAIT {
                    debug!(elapsed = ?started.elapsed(), "required-upstreams-ready poll exceeded the non-blocking wait budget");
                }

                match ready {
                    None | Some(true) => reporter.set_serving::<OverallService>().await,
                    Some(false) => reporter.set_not_serving::<OverallService>().await,
                }
            }

            reporter.set_not_serving::<OverallService>().await;
        });

        *guard = Some(handle);
    }

    /// Cancels the poller and waits for it to report NOT_SERVING before
    /// returning, so the transport never stops accepting while health
    /// still claims SERVING.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Default for HealthPoller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let (reporter, _server) = tonic_health::server::health_reporter();
        let poller = HealthPoller::new();
        let shared = ResourceTable::new();

        poller.start(shared.clone(), reporter.clone()).await;
        poller.start(shared, reporter).await;
        poller.stop().await;
        poller.stop().await;
    }

    #[allow(dead_code)]
    const REQUIRED_UPSTREAMS_READY_KEY: &str = REQUIRED_UPSTREAMS_READY;
}
