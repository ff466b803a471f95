//! gRPC client plug-in: per-service connection pools, circuit breakers,
//! retry, discovery-backed target resolution, and client TLS.

mod breaker;
mod classify;
mod config;
mod discovery;
mod error;
mod plugin;
mod pool;
mod retry;
mod tls;

pub use breaker::BreakerRegistry;
pub use classify::{is_breaker_failure, is_retryable};
pub use config::{ClientAuthType, ClientConfig, ConfigValidationError, LoadBalancer, SelectionStrategy, SubscribedService};
pub use discovery::{DiscoveryHandle, NodeFilter, ServiceInstance, TargetResolver};
pub use error::GrpcClientError;
pub use plugin::{GrpcClient, GrpcClientPlugin};
pub use pool::ConnectionPool;
pub use retry::call_with_retry;
pub use tls::{ClientCertificateProvider, ClientTlsManager, ServiceTlsMaterial, TlsAssemblyError, TlsVersion};
