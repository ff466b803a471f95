use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lynx_core::application::ManagedServer;
use lynx_core::BootstrapError;
use tokio::net::UnixListener;
use tokio::sync::{Mutex, Notify};
use tokio_stream::wrappers::UnixListenerStream;
use tonic::body::BoxBody;
use tonic::transport::{Server, ServerTlsConfig};
use tower::util::BoxCloneService;
use tower::{Service, ServiceBuilder};
use tracing::info;

use super::config::{normalize_tcp_addr, ServiceConfig};
use super::error::GrpcServiceError;
use super::health::HealthPoller;
use super::middleware::{MetricsLayer, PanicRecoveryLayer, RateLimitGate, RateLimitLayer, ServiceMetrics, TracingLayer, ValidationLayer};

/// A `tonic` health service, type-erased behind [`BoxCloneService`] so it
/// can be stashed on [`GrpcManagedServer`] without naming the unnameable
/// `impl Health` type `tonic_health::server::health_reporter` returns.
pub struct BoxedHealthService(
    BoxCloneService<http::Request<BoxBody>, http::Response<BoxBody>, std::convert::Infallible>,
);

impl BoxedHealthService {
    pub fn new<S>(inner: S) -> Self
    where
        S: Service<http::Request<BoxBody>, Response = http::Response<BoxBody>, Error = std::convert::Infallible>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        Self(BoxCloneService::new(inner))
    }
}

impl Clone for BoxedHealthService {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl tonic::server::NamedService for BoxedHealthService {
    const NAME: &'static str = "grpc.health.v1.Health";
}

impl Service<http::Request<BoxBody>> for BoxedHealthService {
    type Response = http::Response<BoxBody>;
    type Error = std::convert::Infallible;
    type Future = futures_util::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.0.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<BoxBody>) -> Self::Future {
        let fut = self.0.call(req);
        Box::pin(fut)
    }
}

/// The assembled gRPC server: middleware chain, TLS, health plane, and the
/// configured network/address, ready for `ManagedServer::run` to bind.
pub struct GrpcManagedServer {
    config: ServiceConfig,
    tls: Option<ServerTlsConfig>,
    health_service: Mutex<Option<BoxedHealthService>>,
    health_poller: Arc<HealthPoller>,
    metrics: ServiceMetrics,
    tracer_name: String,
    rate_limit_gate: Option<Arc<dyn RateLimitGate>>,
    shutdown: tokio_util::sync::CancellationToken,
    shutdown_complete: Notify,
}

impl GrpcManagedServer {
    pub fn new(
        config: ServiceConfig,
        tls: Option<ServerTlsConfig>,
        health_service: BoxedHealthService,
        health_poller: Arc<HealthPoller>,
        metrics: ServiceMetrics,
        tracer_name: String,
        rate_limit_gate: Option<Arc<dyn RateLimitGate>>,
    ) -> Self {
        Self {
            config,
            tls,
            health_service: Mutex::new(Some(health_service)),
            health_poller,
            metrics,
            tracer_name,
            rate_limit_gate,
            shutdown: tokio_util::sync::CancellationToken::new(),
            shutdown_complete: Notify::new(),
        }
    }
}

#[async_trait]
impl ManagedServer for GrpcManagedServer {
    async fn run(&self) -> Result<(), BootstrapError> {
        let health_service = self
            .health_service
            .lock()
            .await
            .take()
            .expect("GrpcManagedServer::run called more than once");

        let middleware = ServiceBuilder::new()
            .layer(TracingLayer::new(self.tracer_name.clone()))
            .layer(ValidationLayer)
            .layer(PanicRecoveryLayer::new(self.metrics.clone()))
            .layer(MetricsLayer::new(self.metrics.clone()))
            .option_layer(self.rate_limit_gate.clone().map(RateLimitLayer::new));

        let mut builder = Server::builder();
        if let Some(tls) = self.tls.clone() {
            builder = builder.tls_config(tls).map_err(|e| BootstrapError::ServerRun(e.to_string()))?;
        }
        let builder = builder
            .max_concurrent_streams(Some(self.config.effective_max_concurrent_streams()))
            .timeout(self.config.timeout())
            .layer(middleware);

        let router = builder.add_service(health_service);
        let shutdown = self.shutdown.clone();

        let result = if self.config.network == "unix" {
            let listener = UnixListener::bind(&self.config.addr).map_err(|source| {
                BootstrapError::ServerRun(
                    GrpcServiceError::Bind { addr: self.config.addr.clone(), source }.to_string(),
                )
            });
            match listener {
                Ok(listener) => {
                    info!(addr = %self.config.addr, "gRPC service plug-in listening on unix socket");
                    router
                        .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async move {
                            shutdown.cancelled().await
                        })
                        .await
                        .map_err(|e| BootstrapError::ServerRun(GrpcServiceError::Transport(e).to_string()))
                }
                Err(e) => Err(e),
            }
        } else {
            match normalize_tcp_addr(&self.config.addr).parse() {
                Ok(addr) => {
                    info!(addr = %addr, "gRPC service plug-in listening");
                    router
                        .serve_with_shutdown(addr, async move { shutdown.cancelled().await })
                        .await
                        .map_err(|e| BootstrapError::ServerRun(GrpcServiceError::Transport(e).to_string()))
                }
                Err(e) => Err(BootstrapError::ServerRun(format!("invalid bind address: {e}"))),
            }
        };

        self.shutdown_complete.notify_waiters();
        result
    }

    async fn stop(&self, deadline: Duration) -> Result<(), BootstrapError> {
        info!("stopping gRPC service plug-in transport");
        self.health_poller.stop().await;
        self.shutdown.cancel();

        tokio::time::timeout(deadline, self.shutdown_complete.notified())
            .await
            .map_err(|_| BootstrapError::ShutdownTimeout(deadline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_health_service_reports_well_known_name() {
        assert_eq!(<BoxedHealthService as tonic::server::NamedService>::NAME, "grpc.health.v1.Health");
    }
}
