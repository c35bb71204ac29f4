//! Directory-driven endpoint pool
//!
//! Discovers interchangeable backend endpoints (e.g. Hyperion or AtomicAssets
//! history nodes) from a directory API, keeps the list fresh in the background
//! and hands endpoints out in round-robin order.
//!
//! # Refresh cycle
//!
//! - Up to three directory attempts, one second apart
//! - First success replaces the live list
//! - Total failure keeps the current list, or installs compiled-in defaults
//!
//! Callers that ask for an endpoint before the first cycle settles wait for it.
//!
//! ```no_run
//! use nodepulse_discovery::{NodePool, PoolConfig};
//!
//! # async fn run() -> nodepulse_discovery::Result<()> {
//! let pool = NodePool::start(PoolConfig::default().with_network("testnet"))?;
//! let endpoint = pool.get_node().await?;
//! println!("using {}", endpoint);
//! # Ok(())
//! # }
//! ```

use std::{fmt, sync::Arc};

use tracing::info;

pub mod config;
pub mod defaults;
pub mod directory;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod refresh;

#[cfg(test)]
mod testing;

pub use config::{LogLevel, MAX_RETRIES, PoolConfig, RETRY_DELAY};
pub use defaults::default_endpoints;
pub use directory::{DirectoryClient, DirectoryQuery, HttpDirectory};
pub use error::{DiscoveryError, Result};
pub use hooks::{FallbackKind, FnObserver, NoopObserver, PoolObserver};
pub use metrics::DiscoveryMetrics;
pub use pool::EndpointPool;
pub use refresh::{DiscoveryRefresher, RefreshOutcome, RefreshTask};

/// Builder for a [`NodePool`]
pub struct NodePoolBuilder {
    config: PoolConfig,
    directory: Option<Arc<dyn DirectoryClient>>,
    observer: Arc<dyn PoolObserver>,
    metrics: Option<Arc<DiscoveryMetrics>>,
}

impl NodePoolBuilder {
    /// Use a custom directory instead of [`HttpDirectory`]
    pub fn directory(mut self, directory: Arc<dyn DirectoryClient>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Receive update, error and fallback notifications
    pub fn observer(mut self, observer: Arc<dyn PoolObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Record discovery and selection metrics
    pub fn metrics(mut self, metrics: Arc<DiscoveryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and start background discovery
    ///
    /// Returns without waiting for the first refresh cycle.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(self) -> Result<NodePool> {
        self.config.validate()?;

        let directory = match self.directory {
            Some(directory) => directory,
            None => Arc::new(HttpDirectory::from_config(&self.config)?),
        };

        let pool = Arc::new(EndpointPool::new());
        let mut refresher =
            DiscoveryRefresher::new(directory, pool.clone(), self.observer, &self.config);
        if let Some(metrics) = &self.metrics {
            refresher = refresher.with_metrics(metrics.clone());
        }
        let refresher = Arc::new(refresher);
        let task = refresher.clone().spawn();

        info!(
            node_type = %self.config.node_type,
            network = %self.config.network,
            api_url = %self.config.api_url,
            "Node pool started"
        );

        Ok(NodePool { config: self.config, pool, refresher, metrics: self.metrics, task })
    }
}

/// Round-robin pool of discovered endpoints
///
/// Owns its background refresh task; the task stops on [`NodePool::shutdown`]
/// or when the pool is dropped.
pub struct NodePool {
    config: PoolConfig,
    pool: Arc<EndpointPool>,
    refresher: Arc<DiscoveryRefresher>,
    metrics: Option<Arc<DiscoveryMetrics>>,
    task: RefreshTask,
}

impl fmt::Debug for NodePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePool")
            .field("config", &self.config)
            .field("nodes", &self.pool.snapshot())
            .field("ready", &self.pool.is_ready())
            .finish_non_exhaustive()
    }
}

impl NodePool {
    /// Start configuring a pool
    pub fn builder(config: PoolConfig) -> NodePoolBuilder {
        NodePoolBuilder { config, directory: None, observer: Arc::new(NoopObserver), metrics: None }
    }

    /// Start a pool backed by the HTTP directory with no observer
    pub fn start(config: PoolConfig) -> Result<Self> {
        Self::builder(config).start()
    }

    /// Get the next endpoint in rotation
    ///
    /// Waits for the first refresh cycle if it has not settled yet. If the
    /// live list is empty, runs one more refresh cycle before giving up.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NoEndpoints`] when discovery has never
    /// succeeded and no defaults exist for the configured node type/network.
    pub async fn get_node(&self) -> Result<String> {
        self.wait_for_nodes().await;

        if self.pool.is_empty() {
            self.refresher.refresh_once().await;
        }

        let node = self.pool.next_endpoint().ok_or_else(|| DiscoveryError::NoEndpoints {
            node_type: self.config.node_type.clone(),
            network: self.config.network.clone(),
        })?;

        if let Some(metrics) = &self.metrics {
            metrics.record_selection();
        }

        Ok(node)
    }

    /// Wait until the first refresh cycle has settled
    ///
    /// Does not consume a rotation slot.
    pub async fn wait_for_nodes(&self) {
        self.pool.wait_ready().await;
    }

    /// Run a refresh cycle now, alongside the background schedule
    pub async fn refresh_nodes(&self) -> RefreshOutcome {
        self.refresher.refresh_once().await
    }

    /// Snapshot of the live list
    pub fn nodes(&self) -> Arc<[String]> {
        self.pool.snapshot()
    }

    /// Whether the first refresh cycle has settled
    pub fn is_ready(&self) -> bool {
        self.pool.is_ready()
    }

    /// Configuration the pool was started with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Stop the background refresh task
    ///
    /// Endpoints already discovered stay available; manual refreshes still work.
    /// If the first cycle had not settled, waiters are released and
    /// [`NodePool::get_node`] runs a cycle of its own.
    pub fn shutdown(&self) {
        self.task.abort();
        self.pool.mark_ready();
    }

    /// Whether the background refresh task is still running
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for NodePool {
    fn drop(&mut self) {
        self.task.abort();
    }
}
