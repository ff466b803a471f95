//! gRPC service plug-in: a `tonic` server behind the kernel's plug-in
//! contract, with a layered middleware chain (tracing, validation, panic
//! recovery, metrics, optional rate limiting), TLS assembly, and a health
//! plane slaved to the process's `required-upstreams-ready` signal.

mod config;
mod health;
mod middleware;
mod plugin;
mod probe;
mod server;
mod tls;

pub use config::{ClientAuthType, ConfigValidationError, ServiceConfig};
pub use health::HealthPoller;
pub use middleware::{RateLimitGate, ServiceMetrics};
pub use plugin::GrpcServicePlugin;
use plugin::SHARED_RESOURCE_KEY;
pub use probe::PortProbe;
pub use server::{BoxedHealthService, GrpcManagedServer};
pub use tls::{CertificateProvider, TlsAssemblyError, TlsVersion};

use std::sync::Arc;

use futures_util::FutureExt;
use lynx_core::application::{ManagedServer, WireFn};
use lynx_core::error::BootstrapError;
use lynx_core::plugin::PluginManager;

/// Builds the wire function an application hands to
/// `ApplicationBuilder::wire`: it pulls the `GrpcManagedServer` this
/// plug-in published during `InitializeResources` out of the shared
/// resource table and upcasts it to the kernel's `ManagedServer` surface.
pub fn wire() -> WireFn {
    Box::new(move |manager: Arc<PluginManager>| {
        async move {
            let server = manager
                .shared_resource::<Arc<GrpcManagedServer>>(SHARED_RESOURCE_KEY)
                .await
                .ok_or_else(|| {
                    BootstrapError::Wire(
                        "grpc-service plug-in did not publish a server; was it loaded and its config_prefix registered?"
                            .to_string(),
                    )
                })?;
            Ok(server as Arc<dyn ManagedServer>)
        }
        .boxed()
    })
}
