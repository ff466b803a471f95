use serde::Deserialize;

pub const DEFAULT_NETWORK: &str = "tcp";
pub const DEFAULT_ADDR: &str = ":9090";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 1000;
pub const DEFAULT_MAX_MSG_SIZE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_MSG_SIZE_WARN_THRESHOLD_BYTES: usize = 200 * 1024 * 1024;

/// Client certificate requirement, mirrored from the gRPC client's
/// `tls_auth_type` enum so the two subtrees stay numerically aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[repr(u8)]
pub enum ClientAuthType {
    NoClientCert = 0,
    RequestClientCert = 1,
    RequireAnyClientCert = 2,
    VerifyClientCertIfGiven = 3,
    RequireAndVerifyClientCert = 4,
}

impl Default for ClientAuthType {
    fn default() -> Self {
        ClientAuthType::NoClientCert
    }
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_addr() -> String {
    DEFAULT_ADDR.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// `grpc.service` subtree, bound via `RuntimeHandle::config`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub tls_enable: bool,
    #[serde(default)]
    pub tls_auth_type: ClientAuthType,
    #[serde(default)]
    pub max_concurrent_streams: u32,
    #[serde(default)]
    pub max_recv_msg_size: usize,
    #[serde(default)]
    pub max_send_msg_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            addr: default_addr(),
            timeout_secs: default_timeout_secs(),
            tls_enable: false,
            tls_auth_type: ClientAuthType::default(),
            max_concurrent_streams: 0,
            max_recv_msg_size: 0,
            max_send_msg_size: 0,
        }
    }
}

impl ServiceConfig {
    pub fn effective_max_concurrent_streams(&self) -> u32 {
        if self.max_concurrent_streams > 0 {
            self.max_concurrent_streams
        } else {
            DEFAULT_MAX_CONCURRENT_STREAMS
        }
    }

    pub fn effective_max_recv_msg_size(&self) -> usize {
        if self.max_recv_msg_size > 0 {
            self.max_recv_msg_size
        } else {
            DEFAULT_MAX_MSG_SIZE_BYTES
        }
    }

    pub fn effective_max_send_msg_size(&self) -> usize {
        if self.max_send_msg_size > 0 {
            self.max_send_msg_size
        } else {
            DEFAULT_MAX_MSG_SIZE_BYTES
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("grpc.service.network must be 'tcp' or 'unix', got {0:?}")]
    InvalidNetwork(String),

    #[error("grpc.service.addr {0:?} is not a valid [host]:port address")]
    InvalidAddr(String),

    #[error("grpc.service.timeout_secs must be greater than zero")]
    InvalidTimeout,
}

/// Validates network/addr/timeout per the configuration contract. Warns
/// (never rejects) on oversized message limits.
pub fn validate(config: &ServiceConfig) -> Result<(), ConfigValidationError> {
    if config.network != "tcp" && config.network != "unix" {
        return Err(ConfigValidationError::InvalidNetwork(config.network.clone()));
    }

    if config.network == "tcp" {
        let normalized = normalize_tcp_addr(&config.addr);
        if normalized.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigValidationError::InvalidAddr(config.addr.clone()));
        }
    }

    if config.timeout_secs == 0 {
        return Err(ConfigValidationError::InvalidTimeout);
    }

    if config.effective_max_recv_msg_size() > MAX_MSG_SIZE_WARN_THRESHOLD_BYTES {
        tracing::warn!(
            bytes = config.effective_max_recv_msg_size(),
            "grpc.service.max_recv_msg_size exceeds 200 MiB"
        );
    }
    if config.effective_max_send_msg_size() > MAX_MSG_SIZE_WARN_THRESHOLD_BYTES {
        tracing::warn!(
            bytes = config.effective_max_send_msg_size(),
            "grpc.service.max_send_msg_size exceeds 200 MiB"
        );
    }

    Ok(())
}

/// `:9090` style addresses omit the host; `SocketAddr` requires one, so an
/// empty host is normalized to `0.0.0.0` for bind purposes.
pub fn normalize_tcp_addr(addr: &str) -> String {
    if let Some(stripped) = addr.strip_prefix(':') {
        format!("0.0.0.0:{stripped}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_zeroed_fields() {
        let config = ServiceConfig::default();
        assert_eq!(config.effective_max_concurrent_streams(), DEFAULT_MAX_CONCURRENT_STREAMS);
        assert_eq!(config.effective_max_recv_msg_size(), DEFAULT_MAX_MSG_SIZE_BYTES);
        assert_eq!(config.effective_max_send_msg_size(), DEFAULT_MAX_MSG_SIZE_BYTES);
    }

    #[test]
    fn rejects_unknown_network() {
        let mut config = ServiceConfig::default();
        config.network = "quic".to_string();
        assert!(matches!(validate(&config), Err(ConfigValidationError::InvalidNetwork(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = ServiceConfig::default();
        config.timeout_secs = 0;
        assert!(matches!(validate(&config), Err(ConfigValidationError::InvalidTimeout)));
    }

    #[test]
    fn normalizes_host_omitted_tcp_addr() {
        assert_eq!(normalize_tcp_addr(":9090"), "0.0.0.0:9090");
        assert_eq!(normalize_tcp_addr("127.0.0.1:9090"), "127.0.0.1:9090");
    }

    #[test]
    fn accepts_valid_tcp_config() {
        let config = ServiceConfig::default();
        assert!(validate(&config).is_ok());
    }
}
