/// Top-level bootstrap failure kinds. Every layer below wraps its own
/// error into one of these crossing the `Application::run` boundary.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(#[from] crate::config::ConfigError),

    #[error("plug-in load failed: {0}")]
    PluginLoad(String),

    #[error("startup circuit breaker is open, refusing to load plug-ins this cycle")]
    StartupBreakerOpen,

    #[error("wire function failed to construct the underlying server: {0}")]
    Wire(String),

    #[error("server run loop failed: {0}")]
    ServerRun(String),

    #[error("graceful shutdown exceeded its budget of {0:?}")]
    ShutdownTimeout(std::time::Duration),

    #[error("server stop failed: {0}")]
    ServerStop(String),

    #[error("recovered panic: {0}")]
    PanicRecovered(String),
}
