//! # lynx-core
//!
//! Application bootstrap and plug-in lifecycle kernel: configuration
//! loading, the plug-in contract and manager, the startup circuit
//! breaker, the background health checker, and the `Application::run`
//! orchestration that ties them together with signal-driven graceful
//! shutdown.
//!
//! Concrete gRPC service/client plug-ins live in their own crates
//! (`lynx-plugin-grpc-service`, `lynx-plugin-grpc-client`); this crate
//! only defines the contract they implement.

pub mod application;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod plugin;

pub use error::BootstrapError;
