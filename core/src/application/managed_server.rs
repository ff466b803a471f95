use std::time::Duration;

use async_trait::async_trait;

use crate::error::BootstrapError;

/// The underlying server produced by the wire function — typically a gRPC
/// service plug-in's `tonic` transport, but the kernel only ever sees this
/// narrow surface. Tests can supply a fake that just sleeps.
#[async_trait]
pub trait ManagedServer: Send + Sync {
    /// Runs until `stop` is called or the server fails on its own.
    async fn run(&self) -> Result<(), BootstrapError>;

    /// Requests a graceful stop; `deadline` bounds how long the server may
    /// take to drain in-flight work before this call gives up.
    async fn stop(&self, deadline: Duration) -> Result<(), BootstrapError>;
}
