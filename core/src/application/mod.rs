//! Application bootstrap: signal-driven `Run()`, the `ManagedServer`
//! surface handed back by the wire function, and graceful shutdown.

mod bootstrap;
mod managed_server;
mod shutdown;
mod signals;

#[cfg(test)]
mod tests;

pub use bootstrap::{Application, ApplicationBuilder, WireFn};
pub use managed_server::ManagedServer;
