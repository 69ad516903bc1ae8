//! Health-checked node acquisition with failover.
//!
//! ```text
//!   acquire(network, exclude)
//!        │
//!        ▼
//!   pick random candidate ──► connect (cached) ──► health + info
//!        ▲                                              │
//!        │          backoff 500–1500 ms                 │ unhealthy /
//!        └──────────────────────────────────────────────┘ unreachable
//!
//!   at most 5 attempts, then TM_ERR_500
//! ```
//!
//! The caller may exclude one candidate index — the node a previous
//! operation just failed against. The exclusion applies to the first pick
//! only; once everything is failing, a retry of the excluded node beats
//! giving up early.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use tanglematch_types::{Network, NodesConfig, PoolConfig, Result, TanglematchError};

use crate::api::{NodeApi, NodeInfo};
use crate::http::HttpNodeApi;

/// A healthy node client, ready for use.
pub struct AcquiredClient {
    pub api: Arc<dyn NodeApi>,
    pub info: NodeInfo,
    /// Index into the network's candidate list; pass back as `exclude` when
    /// an operation through this client fails.
    pub index: usize,
    pub url: String,
}

impl std::fmt::Debug for AcquiredClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquiredClient")
            .field("info", &self.info)
            .field("index", &self.index)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Builds a [`NodeApi`] for a URL. Swappable so tests can script nodes.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn NodeApi>>;
}

/// Production connector: one [`HttpNodeApi`] per URL.
pub struct HttpConnector {
    request_timeout: Duration,
}

impl HttpConnector {
    #[must_use]
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

#[async_trait]
impl NodeConnector for HttpConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn NodeApi>> {
        Ok(Arc::new(HttpNodeApi::new(url, self.request_timeout)?))
    }
}

/// Bounded URL-keyed client cache. Oldest entry is dropped at capacity.
struct ClientCache {
    capacity: usize,
    clients: HashMap<String, Arc<dyn NodeApi>>,
    insertion_order: VecDeque<String>,
}

impl ClientCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clients: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    fn get(&self, url: &str) -> Option<Arc<dyn NodeApi>> {
        self.clients.get(url).cloned()
    }

    fn insert(&mut self, url: String, api: Arc<dyn NodeApi>) {
        if self.clients.contains_key(&url) {
            return;
        }
        if self.insertion_order.len() >= self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.clients.remove(&oldest);
            }
        }
        self.insertion_order.push_back(url.clone());
        self.clients.insert(url, api);
    }

    fn remove(&mut self, url: &str) {
        if self.clients.remove(url).is_some() {
            self.insertion_order.retain(|u| u != url);
        }
    }

    fn len(&self) -> usize {
        self.clients.len()
    }
}

/// Per-network pool of node clients.
///
/// Owns its cache; nothing here is process-global, so two pools never share
/// state.
pub struct NodeClientPool {
    nodes: NodesConfig,
    config: PoolConfig,
    connector: Arc<dyn NodeConnector>,
    cache: Mutex<ClientCache>,
}

impl NodeClientPool {
    pub fn new(nodes: NodesConfig, config: PoolConfig) -> Result<Self> {
        let connector = Arc::new(HttpConnector::new(Duration::from_millis(
            config.request_timeout_ms,
        )));
        Self::with_connector(nodes, config, connector)
    }

    /// Pool with a custom connector. Tests script node behavior this way.
    pub fn with_connector(
        nodes: NodesConfig,
        config: PoolConfig,
        connector: Arc<dyn NodeConnector>,
    ) -> Result<Self> {
        nodes.validate()?;
        config.validate()?;
        let cache = Mutex::new(ClientCache::new(config.cache_capacity));
        Ok(Self {
            nodes,
            config,
            connector,
            cache,
        })
    }

    /// Acquire a healthy client for `network`.
    ///
    /// Tries up to `max_attempts` random candidates with a jittered backoff
    /// between attempts. `exclude` skips one index on the first pick only.
    ///
    /// # Errors
    ///
    /// [`TanglematchError::NodeUnavailable`] once the attempt budget is
    /// spent; [`TanglematchError::Configuration`] when the network has no
    /// candidates at all.
    pub async fn acquire(&self, network: Network, exclude: Option<usize>) -> Result<AcquiredClient> {
        let urls = self.nodes.endpoints_for(network);
        if urls.is_empty() {
            return Err(TanglematchError::Configuration(format!(
                "no node endpoints configured for {network}"
            )));
        }

        for attempt in 0..self.config.max_attempts {
            let excluded = if attempt == 0 { exclude } else { None };
            let index = pick_index(urls.len(), excluded);
            let url = &urls[index];

            match self.candidate(url).await {
                Ok((api, info)) => {
                    debug!(%network, %url, attempt, "acquired node client");
                    return Ok(AcquiredClient {
                        api,
                        info,
                        index,
                        url: url.clone(),
                    });
                }
                Err(err) => {
                    warn!(%network, %url, attempt, %err, "node candidate failed");
                    self.cache.lock().await.remove(url);
                }
            }

            if attempt + 1 < self.config.max_attempts {
                let backoff_ms = {
                    let mut rng = rand::thread_rng();
                    rng.gen_range(self.config.backoff_min_ms..=self.config.backoff_max_ms)
                };
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(TanglematchError::NodeUnavailable { network })
    }

    /// Connect (or reuse) and health-check one candidate.
    async fn candidate(&self, url: &str) -> Result<(Arc<dyn NodeApi>, NodeInfo)> {
        let cached = self.cache.lock().await.get(url);
        let api = match cached {
            Some(api) => api,
            None => {
                let api = self.connector.connect(url).await?;
                self.cache.lock().await.insert(url.to_string(), api.clone());
                api
            }
        };

        if !api.health().await? {
            return Err(TanglematchError::NodeRequestFailed {
                reason: format!("{url} failed the health probe"),
            });
        }
        let info = api.info().await?;
        if !info.healthy {
            return Err(TanglematchError::NodeRequestFailed {
                reason: format!("{url} reports itself unhealthy"),
            });
        }
        Ok((api, info))
    }

    #[cfg(test)]
    async fn cached_clients(&self) -> usize {
        self.cache.lock().await.len()
    }
}

/// Random candidate index, avoiding `exclude` where possible. A single-node
/// list ignores the exclusion — one candidate is better than none.
fn pick_index(len: usize, exclude: Option<usize>) -> usize {
    if len == 1 {
        return 0;
    }
    let mut index = rand::thread_rng().gen_range(0..len);
    if exclude == Some(index) {
        index = (index + 1) % len;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tanglematch_types::{
        Address, OutputKind, ProtocolParameters, RentStructure, SignedTransactionPayload,
        TransferId,
    };

    use crate::api::UnspentOutput;

    fn mock_info(healthy: bool) -> NodeInfo {
        NodeInfo {
            name: "mock".into(),
            version: "2.0.0".into(),
            healthy,
            protocol: ProtocolParameters {
                version: 2,
                network_name: "testnet-1".into(),
                token_supply: 1_813_620_509_061_365,
                rent: RentStructure::default(),
            },
        }
    }

    struct ScriptedNode {
        healthy: bool,
    }

    #[async_trait]
    impl NodeApi for ScriptedNode {
        async fn health(&self) -> Result<bool> {
            Ok(self.healthy)
        }

        async fn info(&self) -> Result<NodeInfo> {
            Ok(mock_info(self.healthy))
        }

        async fn outputs_for_address(
            &self,
            _address: Address,
            _kind: OutputKind,
        ) -> Result<Vec<UnspentOutput>> {
            Ok(Vec::new())
        }

        async fn submit(&self, _payload: &SignedTransactionPayload) -> Result<TransferId> {
            Ok(TransferId::dummy())
        }
    }

    struct ScriptedConnector {
        healthy: bool,
        connects: AtomicUsize,
        seen_urls: Mutex<Vec<String>>,
    }

    impl ScriptedConnector {
        fn new(healthy: bool) -> Self {
            Self {
                healthy,
                connects: AtomicUsize::new(0),
                seen_urls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NodeConnector for ScriptedConnector {
        async fn connect(&self, url: &str) -> Result<Arc<dyn NodeApi>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.seen_urls.lock().await.push(url.to_string());
            Ok(Arc::new(ScriptedNode {
                healthy: self.healthy,
            }))
        }
    }

    fn fast_pool_config() -> PoolConfig {
        PoolConfig {
            backoff_min_ms: 1,
            backoff_max_ms: 2,
            ..PoolConfig::default()
        }
    }

    fn two_node_config() -> NodesConfig {
        let mut nodes = NodesConfig::default();
        nodes.endpoints.insert(
            Network::Rms,
            vec![
                "https://node-a.example".to_string(),
                "https://node-b.example".to_string(),
            ],
        );
        nodes
    }

    #[tokio::test]
    async fn acquires_healthy_node() {
        let connector = Arc::new(ScriptedConnector::new(true));
        let pool = NodeClientPool::with_connector(
            NodesConfig::single(Network::Rms, "https://node.example"),
            fast_pool_config(),
            connector,
        )
        .unwrap();

        let acquired = pool.acquire(Network::Rms, None).await.unwrap();
        assert_eq!(acquired.index, 0);
        assert_eq!(acquired.url, "https://node.example");
        assert!(acquired.info.healthy);
    }

    #[tokio::test]
    async fn gives_up_after_attempt_budget() {
        let connector = Arc::new(ScriptedConnector::new(false));
        let pool = NodeClientPool::with_connector(
            two_node_config(),
            fast_pool_config(),
            connector.clone(),
        )
        .unwrap();

        let err = pool.acquire(Network::Rms, None).await.unwrap_err();
        assert!(matches!(err, TanglematchError::NodeUnavailable { .. }));
        assert!(err.is_transient());
        // Failed candidates are evicted, so every attempt reconnects.
        assert_eq!(connector.connects.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn first_attempt_honors_exclusion() {
        let connector = Arc::new(ScriptedConnector::new(true));
        let pool = NodeClientPool::with_connector(
            two_node_config(),
            fast_pool_config(),
            connector,
        )
        .unwrap();

        for _ in 0..20 {
            let acquired = pool.acquire(Network::Rms, Some(0)).await.unwrap();
            assert_eq!(acquired.index, 1);
        }
    }

    #[tokio::test]
    async fn reuses_cached_client() {
        let connector = Arc::new(ScriptedConnector::new(true));
        let pool = NodeClientPool::with_connector(
            NodesConfig::single(Network::Rms, "https://node.example"),
            fast_pool_config(),
            connector.clone(),
        )
        .unwrap();

        pool.acquire(Network::Rms, None).await.unwrap();
        pool.acquire(Network::Rms, None).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(pool.cached_clients().await, 1);
    }

    #[tokio::test]
    async fn cache_is_bounded() {
        let connector = Arc::new(ScriptedConnector::new(true));
        let mut nodes = NodesConfig::default();
        nodes
            .endpoints
            .insert(Network::Rms, vec!["https://rms.example".to_string()]);
        nodes
            .endpoints
            .insert(Network::Smr, vec!["https://smr.example".to_string()]);
        let config = PoolConfig {
            cache_capacity: 1,
            ..fast_pool_config()
        };
        let pool = NodeClientPool::with_connector(nodes, config, connector.clone()).unwrap();

        pool.acquire(Network::Rms, None).await.unwrap();
        pool.acquire(Network::Smr, None).await.unwrap();
        assert_eq!(pool.cached_clients().await, 1);

        // The first URL was evicted; using it again reconnects.
        pool.acquire(Network::Rms, None).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unknown_network_is_a_config_error() {
        let connector = Arc::new(ScriptedConnector::new(true));
        let pool = NodeClientPool::with_connector(
            NodesConfig::single(Network::Rms, "https://node.example"),
            fast_pool_config(),
            connector,
        )
        .unwrap();

        let err = pool.acquire(Network::Iota, None).await.unwrap_err();
        assert!(matches!(err, TanglematchError::Configuration(_)));
    }

    #[test]
    fn pick_index_never_lands_on_excluded() {
        for _ in 0..200 {
            assert_ne!(pick_index(4, Some(2)), 2);
        }
    }

    #[test]
    fn pick_index_single_candidate_ignores_exclusion() {
        assert_eq!(pick_index(1, Some(0)), 0);
    }
}
