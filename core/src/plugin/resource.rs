use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Key of the one shared resource the core contract requires: written by the
/// gRPC client plug-in once every `required=true` service has connected at
/// least once, read by the gRPC service plug-in's health endpoint.
pub const REQUIRED_UPSTREAMS_READY: &str = "required-upstreams-ready";

struct Entry {
    value: Box<dyn Any + Send + Sync>,
    size_bytes: usize,
}

/// Aggregate counters surfaced to the health checker. Deliberately untyped
/// beyond "numeric" per the contract: the checker only compares against
/// thresholds, it never needs the exact representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceStats {
    pub total_resources: usize,
    pub total_size_bytes: u64,
}

/// A type-erased, named resource map. Used both as the process-wide shared
/// table and as each plug-in's private table — same storage shape, different
/// scope of who can see it.
#[derive(Clone)]
pub struct ResourceTable {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a typed value under `name`, with a caller-supplied size
    /// estimate (bytes) used only for the leak-detection stats the health
    /// checker inspects.
    pub async fn set<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T, size_bytes: usize) {
        let mut guard = self.inner.write().await;
        guard.insert(
            name.into(),
            Entry {
                value: Box::new(value),
                size_bytes,
            },
        );
    }

    pub async fn get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Option<T> {
        let guard = self.inner.read().await;
        guard.get(name).and_then(|entry| entry.value.downcast_ref::<T>()).cloned()
    }

    pub async fn remove(&self, name: &str) -> bool {
        let mut guard = self.inner.write().await;
        guard.remove(name).is_some()
    }

    pub async fn stats(&self) -> ResourceStats {
        let guard = self.inner.read().await;
        ResourceStats {
            total_resources: guard.len(),
            total_size_bytes: guard.values().map(|e| e.size_bytes as u64).sum(),
        }
    }

    /// `required-upstreams-ready` is monotonic false→true within a process
    /// lifetime: a publish to `false` is ignored once the resource has
    /// already observed `true`.
    pub async fn publish_required_upstreams_ready(&self, ready: bool) {
        if ready {
            self.set(REQUIRED_UPSTREAMS_READY, true, std::mem::size_of::<bool>()).await;
            return;
        }
        let already_ready = self.get::<bool>(REQUIRED_UPSTREAMS_READY).await.unwrap_or(false);
        if !already_ready {
            self.set(REQUIRED_UPSTREAMS_READY, false, std::mem::size_of::<bool>()).await;
        }
    }

    /// `None` means the resource has never been published: the health
    /// endpoint's contract treats that the same as `true` (SERVING).
    pub async fn required_upstreams_ready(&self) -> Option<bool> {
        self.get::<bool>(REQUIRED_UPSTREAMS_READY).await
    }
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_get_roundtrip_typed_value() {
        let table = ResourceTable::new();
        table.set("conn-pool-size", 42u32, 8).await;
        assert_eq!(table.get::<u32>("conn-pool-size").await, Some(42));
        assert_eq!(table.get::<String>("conn-pool-size").await, None);
    }

    #[tokio::test]
    async fn stats_sum_sizes_across_entries() {
        let table = ResourceTable::new();
        table.set("a", 1u32, 100).await;
        table.set("b", 2u32, 250).await;
        let stats = table.stats().await;
        assert_eq!(stats.total_resources, 2);
        assert_eq!(stats.total_size_bytes, 350);
    }

    #[tokio::test]
    async fn required_upstreams_ready_absent_by_default() {
        let table = ResourceTable::new();
        assert_eq!(table.required_upstreams_ready().await, None);
    }

    #[tokio::test]
    async fn required_upstreams_ready_is_monotonic_false_to_true() {
        let table = ResourceTable::new();
        table.publish_required_upstreams_ready(false).await;
        assert_eq!(table.required_upstreams_ready().await, Some(false));

        table.publish_required_upstreams_ready(true).await;
        assert_eq!(table.required_upstreams_ready().await, Some(true));

        // A later false publish must not un-ready the resource.
        table.publish_required_upstreams_ready(false).await;
        assert_eq!(table.required_upstreams_ready().await, Some(true));
    }
}
