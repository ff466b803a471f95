use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tonic::transport::Channel;
use tracing::{debug, info, warn};

use super::config::SelectionStrategy;

/// A single pooled channel plus the bookkeeping the eviction and selection
/// logic needs. `tonic::transport::Channel` has no connectivity-state
/// introspection, so health here is reported by the caller via
/// `mark_unhealthy` rather than polled from the transport directly.
pub struct PooledConnection {
    channel: Channel,
    use_count: AtomicU64,
    healthy: std::sync::atomic::AtomicBool,
    last_used: StdMutex<Instant>,
}

impl PooledConnection {
    fn new(channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            channel,
            use_count: AtomicU64::new(0),
            healthy: std::sync::atomic::AtomicBool::new(true),
            last_used: StdMutex::new(Instant::now()),
        })
    }

    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    pub fn use_count(&self) -> u64 {
        self.use_count.load(Ordering::Relaxed)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::Relaxed);
    }

    fn mark_used(&self) {
        self.use_count.fetch_add(1, Ordering::Relaxed);
        *self.last_used.lock().expect("last_used mutex poisoned") = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.lock().expect("last_used mutex poisoned").elapsed()
    }
}

/// The pool of connections maintained for a single backend service.
struct ServicePool {
    service: String,
    connections: RwLock<Vec<Arc<PooledConnection>>>,
    strategy: SelectionStrategy,
    round_robin_index: AtomicUsize,
    cap: usize,
    last_touched: StdMutex<Instant>,
}

impl ServicePool {
    fn new(service: String, strategy: SelectionStrategy, cap: usize) -> Arc<Self> {
        Arc::new(Self {
            service,
            connections: RwLock::new(Vec::new()),
            strategy,
            round_robin_index: AtomicUsize::new(0),
            cap,
            last_touched: StdMutex::new(Instant::now()),
        })
    }

    fn touch(&self) {
        *self.last_touched.lock().expect("last_touched mutex poisoned") = Instant::now();
    }

    fn last_touched(&self) -> Instant {
        *self.last_touched.lock().expect("last_touched mutex poisoned")
    }

    async fn acquire<F, Fut, E>(&self, create: F) -> Result<Channel, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Channel, E>>,
    {
        self.touch();

        {
            let mut guard = self.connections.write().await;
            let before = guard.len();
            guard.retain(|conn| conn.is_healthy());
            if guard.len() != before {
                debug!(service = %self.service, closed = before - guard.len(), "swept unhealthy connections");
            }

            if let Some(conn) = self.select(&guard) {
                conn.mark_used();
                return Ok(conn.channel());
            }

            if guard.len() >= self.cap {
                if let Some(victim) = least_used_index(&guard) {
                    guard.remove(victim);
                }
            }
        }

        let channel = create().await?;
        let conn = PooledConnection::new(channel.clone());
        conn.mark_used();
        self.connections.write().await.push(conn);
        Ok(channel)
    }

    fn select(&self, connections: &[Arc<PooledConnection>]) -> Option<Arc<PooledConnection>> {
        if connections.is_empty() {
            return None;
        }
        match self.strategy {
            SelectionStrategy::RoundRobin => {
                let index = self.round_robin_index.fetch_add(1, Ordering::Relaxed) % connections.len();
                Some(connections[index].clone())
            }
            SelectionStrategy::Random => {
                let index = rand::thread_rng().gen_range(0..connections.len());
                Some(connections[index].clone())
            }
            SelectionStrategy::LeastUsed => connections.iter().min_by_key(|c| c.use_count()).cloned(),
            SelectionStrategy::FirstAvailable => connections.first().cloned(),
        }
    }

    async fn is_idle(&self, idle_timeout: Duration) -> bool {
        let touched_idle = self.last_touched.lock().expect("last_touched mutex poisoned").elapsed() > idle_timeout;
        touched_idle && self.connections.read().await.is_empty()
    }

    async fn sweep_idle_connections(&self, idle_timeout: Duration) -> usize {
        let mut guard = self.connections.write().await;
        let before = guard.len();
        guard.retain(|conn| conn.is_healthy() && conn.idle_for() <= idle_timeout);
        before - guard.len()
    }

    async fn size(&self) -> usize {
        self.connections.read().await.len()
    }
}

fn least_used_index(connections: &[Arc<PooledConnection>]) -> Option<usize> {
    connections
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| c.use_count())
        .map(|(index, _)| index)
}

fn least_recently_touched(pools: &HashMap<String, Arc<ServicePool>>) -> Option<String> {
    pools.iter().min_by_key(|(_, pool)| pool.last_touched()).map(|(service, _)| service.clone())
}

const SERVICE_POOL_RETRY_ATTEMPTS: u32 = 3;

/// Multi-service connection pool with per-service channel pools, a service
/// cap with LRU eviction, and a background idle sweeper.
pub struct ConnectionPool {
    pools: RwLock<HashMap<String, Arc<ServicePool>>>,
    pooling_enabled: bool,
    service_cap: usize,
    per_service_cap: usize,
    idle_timeout: Duration,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
    stopped: std::sync::atomic::AtomicBool,
}

impl ConnectionPool {
    pub fn new(pooling_enabled: bool, service_cap: usize, per_service_cap: usize, idle_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            pools: RwLock::new(HashMap::new()),
            pooling_enabled,
            service_cap,
            per_service_cap,
            idle_timeout,
            sweeper: StdMutex::new(None),
            stopped: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Starts the idle sweeper, ticking at `idle_timeout / 2`. Safe to call
    /// at most once; subsequent calls are a no-op.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut guard = self.sweeper.lock().expect("sweeper mutex poisoned");
        if guard.is_some() {
            return;
        }
        let pool = self.clone();
        let tick = (self.idle_timeout / 2).max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                pool.sweep_once().await;
            }
        });
        *guard = Some(handle);
    }

    async fn sweep_once(&self) {
        let snapshot: Vec<Arc<ServicePool>> = self.pools.read().await.values().cloned().collect();

        let mut idle_services = Vec::new();
        let mut total_closed = 0usize;
        for service_pool in &snapshot {
            total_closed += service_pool.sweep_idle_connections(self.idle_timeout).await;
            if service_pool.is_idle(self.idle_timeout).await {
                idle_services.push(service_pool.service.clone());
            }
        }

        if !idle_services.is_empty() {
            let mut guard = self.pools.write().await;
            for service in &idle_services {
                guard.remove(service);
            }
        }

        if total_closed > 0 || !idle_services.is_empty() {
            debug!(closed_connections = total_closed, closed_service_pools = idle_services.len(), "idle sweep completed");
        }
    }

    /// Acquire a connection for `service`, creating the service-pool and/or
    /// connection as needed. Falls through to an uncached `create()` call
    /// when pooling is disabled or the service-pool keeps getting evicted
    /// out from under a concurrent caller.
    pub async fn get_connection<F, Fut, E>(&self, service: &str, strategy: SelectionStrategy, create: F) -> Result<Channel, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Channel, E>>,
    {
        if !self.pooling_enabled {
            return create().await;
        }

        for _ in 0..SERVICE_POOL_RETRY_ATTEMPTS {
            self.ensure_service_pool(service, strategy).await;

            let service_pool = {
                let guard = self.pools.read().await;
                guard.get(service).cloned()
            };

            if let Some(service_pool) = service_pool {
                return service_pool.acquire(&create).await;
            }
        }

        warn!(service, "service-pool kept disappearing under concurrent eviction; falling through to an uncached connection");
        create().await
    }

    async fn ensure_service_pool(&self, service: &str, strategy: SelectionStrategy) {
        let exists = self.pools.read().await.contains_key(service);
        if exists {
            return;
        }

        let mut guard = self.pools.write().await;
        if guard.contains_key(service) {
            return;
        }

        if guard.len() >= self.service_cap {
            if let Some(victim) = least_recently_touched(&guard) {
                warn!(evicted = %victim, "service-pool cap reached, evicting the least-recently-used service-pool");
                guard.remove(&victim);
            }
        }

        info!(service, "creating service-pool");
        guard.insert(service.to_string(), ServicePool::new(service.to_string(), strategy, self.per_service_cap));
    }

    pub async fn pool_size(&self, service: &str) -> usize {
        match self.pools.read().await.get(service) {
            Some(pool) => pool.size().await,
            None => 0,
        }
    }

    /// Stops the sweeper exactly once, then drops every pooled connection.
    /// `tonic::transport::Channel` has no explicit close method; dropping
    /// the pooled connections is what releases the underlying transport.
    pub async fn close_all(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.sweeper.lock().expect("sweeper mutex poisoned").take() {
            handle.abort();
        }

        let mut guard = self.pools.write().await;
        let service_count = guard.len();
        guard.clear();
        info!(service_count, "closed all gRPC connection pools");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_selection_wraps_around() {
        let index = AtomicUsize::new(0);
        let len = 3usize;
        let picks: Vec<usize> = (0..7).map(|_| index.fetch_add(1, Ordering::Relaxed) % len).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn least_used_index_picks_the_minimum() {
        let a = PooledConnection {
            channel: dummy_channel(),
            use_count: AtomicU64::new(5),
            healthy: std::sync::atomic::AtomicBool::new(true),
            last_used: StdMutex::new(Instant::now()),
        };
        let b = PooledConnection {
            channel: dummy_channel(),
            use_count: AtomicU64::new(1),
            healthy: std::sync::atomic::AtomicBool::new(true),
            last_used: StdMutex::new(Instant::now()),
        };
        let connections = vec![Arc::new(a), Arc::new(b)];
        assert_eq!(least_used_index(&connections), Some(1));
    }

    fn dummy_channel() -> Channel {
        Channel::from_static("http://localhost:1").connect_lazy()
    }

    #[tokio::test]
    async fn pooling_disabled_always_calls_create() {
        let pool = ConnectionPool::new(false, 4, 4, Duration::from_secs(60));
        let calls = Arc::new(AtomicU64::new(0));
        let calls_clone = calls.clone();
        let result = pool
            .get_connection("svc", SelectionStrategy::RoundRobin, move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok::<_, std::convert::Infallible>(dummy_channel())
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn reuses_a_pooled_connection_on_the_second_call() {
        let pool = ConnectionPool::new(true, 4, 4, Duration::from_secs(60));
        let calls = Arc::new(AtomicU64::new(0));
        for _ in 0..2 {
            let calls_clone = calls.clone();
            pool.get_connection("svc", SelectionStrategy::RoundRobin, move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok::<_, std::convert::Infallible>(dummy_channel())
                }
            })
            .await
            .unwrap();
        }
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(pool.pool_size("svc").await, 1);
    }
}
