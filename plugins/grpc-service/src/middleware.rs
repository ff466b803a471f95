use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};
use tonic::body::BoxBody;
use tonic::Status;
use tower::{Layer, Service};
use tracing::{error, info_span, Instrument};

/// Consulted by [`RateLimitLayer`] for each request. The concrete policy
/// (token bucket, sliding window, ...) lives outside the kernel; a plug-in
/// supplies this via the control-plane accessor.
pub trait RateLimitGate: Send + Sync {
    fn allow(&self) -> bool;
}

/// gRPC-aware metrics, registered once per service plug-in instance.
#[derive(Clone)]
pub struct ServiceMetrics {
    request_duration: Histogram,
    requests_total: IntCounterVec,
    panics_total: prometheus::IntCounter,
}

impl ServiceMetrics {
    pub fn register(registry: &Registry, service_name: &str) -> Result<Self, prometheus::Error> {
        let request_duration = Histogram::with_opts(
            HistogramOpts::new("lynx_grpc_service_request_duration_seconds", "gRPC request handling latency")
                .const_label("service", service_name),
        )?;
        let requests_total = IntCounterVec::new(
            Opts::new("lynx_grpc_service_requests_total", "gRPC requests handled, labeled by transport status")
                .const_label("service", service_name),
            &["status"],
        )?;
        let panics_total = prometheus::IntCounter::with_opts(
            Opts::new("lynx_grpc_service_handler_panics_total", "Panics recovered from gRPC handlers")
                .const_label("service", service_name),
        )?;

        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(panics_total.clone()))?;

        Ok(Self {
            request_duration,
            requests_total,
            panics_total,
        })
    }
}

/// Tracing span per request, tracer name = application name.
#[derive(Clone)]
pub struct TracingLayer {
    tracer_name: Arc<str>,
}

impl TracingLayer {
    pub fn new(tracer_name: impl Into<Arc<str>>) -> Self {
        Self { tracer_name: tracer_name.into() }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingMiddleware { inner, tracer_name: self.tracer_name.clone() }
    }
}

#[derive(Clone)]
pub struct TracingMiddleware<S> {
    inner: S,
    tracer_name: Arc<str>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for TracingMiddleware<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let path = req.uri().path().to_string();
        let tracer = self.tracer_name.clone();
        let mut inner = self.inner.clone();
        let span = info_span!("grpc_request", tracer = %tracer, path = %path);
        async move { inner.call(req).await }.instrument(span).boxed()
    }
}

/// Rejects requests whose `content-type` does not look like gRPC, before
/// they reach the handler.
#[derive(Clone, Default)]
pub struct ValidationLayer;

impl<S> Layer<S> for ValidationLayer {
    type Service = ValidationMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ValidationMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct ValidationMiddleware<S> {
    inner: S,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for ValidationMiddleware<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let looks_like_grpc = req
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/grpc"))
            .unwrap_or(false);

        if !looks_like_grpc {
            let response = Status::invalid_argument("expected application/grpc content-type").to_http();
            return Box::pin(async move { Ok(response) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

/// Catches panics inside the handler, converts them to `Status::internal`,
/// and swallows them rather than propagating — one misbehaving handler
/// must not bring the whole transport down.
#[derive(Clone)]
pub struct PanicRecoveryLayer {
    metrics: ServiceMetrics,
}

impl PanicRecoveryLayer {
    pub fn new(metrics: ServiceMetrics) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for PanicRecoveryLayer {
    type Service = PanicRecoveryMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PanicRecoveryMiddleware { inner, metrics: self.metrics.clone() }
    }
}

#[derive(Clone)]
pub struct PanicRecoveryMiddleware<S> {
    inner: S,
    metrics: ServiceMetrics,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for PanicRecoveryMiddleware<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let mut inner = self.inner.clone();
        let metrics = self.metrics.clone();
        Box::pin(async move {
            match AssertUnwindSafe(inner.call(req)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!(panic = %message, "recovered panic from gRPC handler");
                    metrics.panics_total.inc();
                    Ok(Status::internal("internal error").to_http())
                }
            }
        })
    }
}

/// Records request duration and a transport-status counter.
#[derive(Clone)]
pub struct MetricsLayer {
    metrics: ServiceMetrics,
}

impl MetricsLayer {
    pub fn new(metrics: ServiceMetrics) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsMiddleware { inner, metrics: self.metrics.clone() }
    }
}

#[derive(Clone)]
pub struct MetricsMiddleware<S> {
    inner: S,
    metrics: ServiceMetrics,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for MetricsMiddleware<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let mut inner = self.inner.clone();
        let metrics = self.metrics.clone();
        Box::pin(async move {
            let start = Instant::now();
            let result = inner.call(req).await;
            metrics.request_duration.observe(start.elapsed().as_secs_f64());
            let status_label = match &result {
                Ok(response) => response.status().as_u16().to_string(),
                Err(_) => "transport_error".to_string(),
            };
            metrics.requests_total.with_label_values(&[&status_label]).inc();
            result
        })
    }
}

/// Applied only when the control-plane accessor yields a gate; rejects with
/// `RESOURCE_EXHAUSTED` when the gate denies the request.
#[derive(Clone)]
pub struct RateLimitLayer {
    gate: Arc<dyn RateLimitGate>,
}

impl RateLimitLayer {
    pub fn new(gate: Arc<dyn RateLimitGate>) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware { inner, gate: self.gate.clone() }
    }
}

#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    gate: Arc<dyn RateLimitGate>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for RateLimitMiddleware<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        if !self.gate.allow() {
            let response = Status::resource_exhausted("rate limit exceeded").to_http();
            return Box::pin(async move { Ok(response) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysDeny;
    impl RateLimitGate for AlwaysDeny {
        fn allow(&self) -> bool {
            false
        }
    }

    #[test]
    fn rate_limit_gate_denies_as_configured() {
        let gate = AlwaysDeny;
        assert!(!gate.allow());
    }
}
