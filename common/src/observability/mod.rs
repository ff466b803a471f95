//! Logging setup and tracing helpers shared by the kernel and every
//! plug-in. Deliberately stops at `tracing`/`tracing-subscriber`: concrete
//! export backends (OTLP, Prometheus remote-write, ...) are sinks the
//! kernel never opens an opinion on.

mod interceptor;
mod logging;
mod tracing_utils;

pub use logging::{init_logging, shutdown_logging, LoggingConfig};
pub use tracing_utils::{format_elapsed, parse_traceparent, TraceContext};

#[cfg(feature = "grpc")]
pub use interceptor::log_grpc_metadata;
