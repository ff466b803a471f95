#[derive(Debug, thiserror::Error)]
pub enum GrpcServiceError {
    #[error("configuration invalid: {0}")]
    Config(#[from] super::config::ConfigValidationError),

    #[error("configuration rejected, rolled back to the previous value: {0}")]
    ConfigUpdateRejected(String),

    #[error("TLS assembly failed: {0}")]
    Tls(#[from] super::tls::TlsAssemblyError),

    #[error("failed to bind listener at {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}
