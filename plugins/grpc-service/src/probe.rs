use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::config::normalize_tcp_addr;

const DIAL_TIMEOUT: Duration = Duration::from_secs(2);
const FAILURE_CACHE_WINDOW: Duration = Duration::from_millis(500);

/// TCP liveness probe used by `CheckHealth`, never by startup. Caches only
/// *failures* for a short window so a crash is never masked by a stale
/// cached success.
pub struct PortProbe {
    addr: SocketAddr,
    last_failure: Mutex<Option<Instant>>,
}

impl PortProbe {
    pub fn new(raw_addr: &str) -> Result<Arc<Self>, std::net::AddrParseError> {
        let normalized = normalize_tcp_addr(raw_addr);
        let addr = normalized.parse()?;
        Ok(Arc::new(Self {
            addr,
            last_failure: Mutex::new(None),
        }))
    }

    pub async fn is_reachable(&self) -> bool {
        {
            let last_failure = self.last_failure.lock().await;
            if let Some(at) = *last_failure {
                if at.elapsed() < FAILURE_CACHE_WINDOW {
                    return false;
                }
            }
        }

        match tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(self.addr)).await {
            Ok(Ok(_stream)) => true,
            _ => {
                *self.last_failure.lock().await = Some(Instant::now());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_before_parsing() {
        let probe = PortProbe::new(":9090").unwrap();
        assert_eq!(probe.addr.port(), 9090);
    }

    #[tokio::test]
    async fn unreachable_port_reports_false_and_caches_the_failure() {
        // Port 1 is privileged/unused in test sandboxes; connecting should fail fast.
        let probe = PortProbe::new("127.0.0.1:1").unwrap();
        assert!(!probe.is_reachable().await);
        assert!(probe.last_failure.lock().await.is_some());
    }
}
