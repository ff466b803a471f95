use std::time::SystemTime;

/// Point-in-time snapshot of the background checker's assessment. Cloned
/// out on every `is_healthy`/`snapshot` call rather than handed out by
/// reference, so callers never hold the lock across an await.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub healthy: bool,
    pub last_check: Option<SystemTime>,
    pub warnings: Vec<String>,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self {
            healthy: true,
            last_check: None,
            warnings: Vec::new(),
        }
    }
}

/// Resource-stat thresholds the checker warns on. Exceeding these is not
/// fatal by itself — only stale unload failures flip `healthy` to false.
pub const RESOURCE_COUNT_WARN_THRESHOLD: usize = 1000;
pub const RESOURCE_SIZE_WARN_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

/// A recent unload failure is "live" for this long before the checker
/// stops counting it against overall health.
pub const UNLOAD_FAILURE_STALE_AFTER: std::time::Duration = std::time::Duration::from_secs(5 * 60);

pub const DEFAULT_CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);
