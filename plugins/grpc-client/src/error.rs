#[derive(Debug, thiserror::Error)]
pub enum GrpcClientError {
    #[error("configuration invalid: {0}")]
    Config(#[from] super::config::ConfigValidationError),

    #[error("service {0:?} is not subscribed")]
    UnknownService(String),

    #[error("circuit breaker is open for service {0:?}")]
    BreakerOpen(String),

    #[error("failed to connect to {endpoint:?} for service {service:?}: {source}")]
    Connect {
        service: String,
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("call to service {service:?} failed: {status}")]
    Call { service: String, status: tonic::Status },

    #[error("retries exhausted calling service {service:?}: {message}")]
    RetriesExhausted { service: String, message: String },

    #[error("TLS assembly failed for service {service:?}: {reason}")]
    Tls { service: String, reason: String },

    #[error("TLS credentials not configured for service {0:?}")]
    NoCredentials(String),

    #[error("required upstream {0:?} could not be reached at startup")]
    RequiredUpstreamUnreachable(String),
}
