//! Background discovery refresh task
//!
//! A refresh cycle makes up to [`MAX_RETRIES`] directory attempts spaced
//! [`RETRY_DELAY`] apart. The first success replaces the live list. If every
//! attempt fails, the pool keeps its current list, or installs the compiled-in
//! defaults when it has none. Either way the readiness gate opens.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use tokio::{
    task::JoinHandle,
    time::{Duration, MissedTickBehavior, interval, sleep},
};
use tracing::{Level, debug, error, info, warn};

use crate::{
    config::{LogLevel, MAX_RETRIES, PoolConfig, RETRY_DELAY},
    defaults::default_endpoints,
    directory::{DirectoryClient, DirectoryQuery},
    error::DiscoveryError,
    hooks::{FallbackKind, PoolObserver},
    metrics::DiscoveryMetrics,
    pool::EndpointPool,
};

/// Result of one refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The directory answered; the live list now holds this many endpoints
    Updated(usize),
    /// Every attempt failed and the pool fell back
    Fallback(FallbackKind),
    /// Every attempt failed, the pool was empty and no defaults exist
    ///
    /// Observers still see a default fallback with an empty list.
    Unavailable,
}

/// Handle to a spawned refresh loop
///
/// Dropping the handle leaves the loop running; call [`RefreshTask::abort`] to stop it.
#[derive(Debug)]
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Stop the refresh loop
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Whether the refresh loop has stopped
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Refreshes a pool's endpoints from a directory
pub struct DiscoveryRefresher {
    /// Directory the endpoints come from
    directory: Arc<dyn DirectoryClient>,
    /// Pool to update
    pool: Arc<EndpointPool>,
    /// Receives every outcome
    observer: Arc<dyn PoolObserver>,
    /// Optional Prometheus metrics
    metrics: Option<Arc<DiscoveryMetrics>>,
    /// Query sent on every attempt
    query: DirectoryQuery,
    /// Reporting threshold for this pool
    log_level: LogLevel,
    /// How often to refresh endpoints
    refresh_interval: Duration,
}

impl std::fmt::Debug for DiscoveryRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryRefresher")
            .field("directory", &self.directory)
            .field("query", &self.query)
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}

impl DiscoveryRefresher {
    /// Create a new discovery refresher
    ///
    /// # Arguments
    ///
    /// * `directory` - Where endpoints are discovered
    /// * `pool` - The pool whose live list is maintained
    /// * `observer` - Receives update, error and fallback notifications
    /// * `config` - Supplies the query, reporting threshold and refresh interval
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        pool: Arc<EndpointPool>,
        observer: Arc<dyn PoolObserver>,
        config: &PoolConfig,
    ) -> Self {
        Self {
            directory,
            pool,
            observer,
            metrics: None,
            query: DirectoryQuery::from(config),
            log_level: config.log_level,
            refresh_interval: config.update_interval(),
        }
    }

    /// Record outcomes in Prometheus metrics
    pub fn with_metrics(mut self, metrics: Arc<DiscoveryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the background refresh loop
    ///
    /// The first cycle starts immediately; later cycles follow every
    /// `refresh_interval`. The loop runs until the returned task is aborted.
    pub fn spawn(self: Arc<Self>) -> RefreshTask {
        let refresh_interval_ms =
            u64::try_from(self.refresh_interval.as_millis()).unwrap_or(u64::MAX);
        info!(
            node_type = %self.query.node_type,
            network = %self.query.network,
            refresh_interval_ms,
            "Spawning discovery refresh task"
        );

        let handle = tokio::spawn(async move {
            let mut timer = interval(self.refresh_interval.max(Duration::from_millis(1)));
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // First tick completes immediately
                timer.tick().await;

                debug!(
                    node_type = %self.query.node_type,
                    network = %self.query.network,
                    "Refreshing endpoints"
                );

                self.refresh_once().await;
            }
        });

        RefreshTask { handle }
    }

    /// Run one refresh cycle, including retries and fallback
    ///
    /// Never fails: discovery errors go to the observer and the log, and the
    /// pool is left ready with the best list available.
    pub async fn refresh_once(&self) -> RefreshOutcome {
        for attempt in 1..=MAX_RETRIES {
            let error = match self.directory.fetch(&self.query).await {
                Ok(nodes) if !nodes.is_empty() => {
                    self.record_attempt(true);
                    return self.apply_update(nodes);
                },
                Ok(_) => DiscoveryError::EmptyResponse,
                Err(e) => e,
            };

            self.record_attempt(false);

            match &error {
                DiscoveryError::Transport(_) => {
                    if self.log_level.allows(Level::ERROR) {
                        error!(
                            node_type = %self.query.node_type,
                            network = %self.query.network,
                            attempt,
                            error = %error,
                            "Failed to fetch nodes"
                        );
                    }
                },
                _ => {
                    if self.log_level.allows(Level::WARN) {
                        warn!(
                            node_type = %self.query.node_type,
                            network = %self.query.network,
                            attempt,
                            error = %error,
                            "No nodes received or unexpected response"
                        );
                    }
                },
            }

            self.notify("on_error", |observer| observer.on_error(&error));

            if attempt < MAX_RETRIES {
                sleep(RETRY_DELAY).await;
            }
        }

        self.apply_fallback()
    }

    /// Get the refresh interval
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn apply_update(&self, nodes: Vec<String>) -> RefreshOutcome {
        let count = nodes.len();
        self.pool.replace(nodes);
        self.pool.mark_ready();

        let nodes = self.pool.snapshot();
        if let Some(metrics) = &self.metrics {
            metrics.set_live_endpoints(nodes.len());
        }

        if self.log_level.allows(Level::INFO) {
            info!(
                node_type = %self.query.node_type,
                network = %self.query.network,
                count,
                nodes = ?nodes,
                "Updated nodes"
            );
        }

        self.notify("on_update", |observer| observer.on_update(&nodes));
        RefreshOutcome::Updated(count)
    }

    fn apply_fallback(&self) -> RefreshOutcome {
        let current = self.pool.snapshot();

        let (kind, nodes) = if !current.is_empty() {
            (FallbackKind::Existing, current)
        } else if let Some(defaults) =
            default_endpoints(&self.query.node_type, &self.query.network)
        {
            self.pool.replace(defaults.iter().map(|url| url.to_string()).collect());
            (FallbackKind::Default, self.pool.snapshot())
        } else {
            (FallbackKind::Default, current)
        };

        self.pool.mark_ready();
        if let Some(metrics) = &self.metrics {
            metrics.record_fallback(kind);
            metrics.set_live_endpoints(nodes.len());
        }

        if nodes.is_empty() {
            if self.log_level.allows(Level::ERROR) {
                error!(
                    node_type = %self.query.node_type,
                    network = %self.query.network,
                    "All attempts to fetch nodes failed and no default nodes are configured"
                );
            }
        } else if self.log_level.allows(Level::WARN) {
            warn!(
                node_type = %self.query.node_type,
                network = %self.query.network,
                kind = %kind,
                count = nodes.len(),
                "All attempts to fetch nodes failed, using {} nodes",
                kind
            );
        }

        self.notify("on_fallback", |observer| observer.on_fallback(kind, &nodes));

        if nodes.is_empty() { RefreshOutcome::Unavailable } else { RefreshOutcome::Fallback(kind) }
    }

    fn record_attempt(&self, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_directory_request(success);
        }
    }

    /// Invoke an observer hook, containing any panic it raises
    fn notify(&self, hook: &'static str, f: impl FnOnce(&dyn PoolObserver)) {
        let observer = self.observer.as_ref();
        if panic::catch_unwind(AssertUnwindSafe(|| f(observer))).is_err() {
            error!(hook, "Pool observer panicked, continuing refresh cycle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hooks::NoopObserver,
        testing::{Event, RecordingObserver, ScriptedDirectory, nodes},
    };

    fn refresher(
        directory: Arc<ScriptedDirectory>,
        config: &PoolConfig,
    ) -> (DiscoveryRefresher, Arc<EndpointPool>, Arc<RecordingObserver>) {
        let pool = Arc::new(EndpointPool::new());
        let observer = Arc::new(RecordingObserver::default());
        let refresher = DiscoveryRefresher::new(directory, pool.clone(), observer.clone(), config);
        (refresher, pool, observer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let directory = Arc::new(ScriptedDirectory::new([Ok(nodes(&["https://a", "https://b"]))]));
        let (refresher, pool, observer) = refresher(directory.clone(), &PoolConfig::default());

        let outcome = refresher.refresh_once().await;

        assert_eq!(outcome, RefreshOutcome::Updated(2));
        assert_eq!(directory.calls(), 1);
        assert!(pool.is_ready());
        assert_eq!(&*pool.snapshot(), &nodes(&["https://a", "https://b"])[..]);
        assert_eq!(observer.events(), vec![Event::Update(nodes(&["https://a", "https://b"]))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_sent_to_directory() {
        let directory = Arc::new(ScriptedDirectory::new([Ok(nodes(&["https://a"]))]));
        let config = PoolConfig::default().with_node_type("atomic").with_network("testnet").with_node_count(9);
        let (refresher, _, _) = refresher(directory.clone(), &config);

        refresher.refresh_once().await;

        let queries = directory.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].node_type, "atomic");
        assert_eq!(queries[0].network, "testnet");
        assert_eq!(queries[0].count, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_constant_delay() {
        let directory = Arc::new(ScriptedDirectory::failing());
        let (refresher, _, observer) = refresher(directory.clone(), &PoolConfig::default());

        refresher.refresh_once().await;

        assert_eq!(directory.calls(), MAX_RETRIES as usize);
        let times = directory.call_times();
        for pair in times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= RETRY_DELAY, "gap {:?} shorter than retry delay", gap);
            assert!(gap < RETRY_DELAY + Duration::from_millis(100), "gap {:?} too long", gap);
        }
        assert_eq!(observer.error_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_last_attempt() {
        let directory = Arc::new(ScriptedDirectory::failing());
        let (refresher, _, _) = refresher(directory, &PoolConfig::default());

        let start = tokio::time::Instant::now();
        refresher.refresh_once().await;

        let elapsed = start.elapsed();
        let expected = RETRY_DELAY * (MAX_RETRIES - 1);
        assert!(elapsed >= expected && elapsed < expected + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures_stops_retrying() {
        let directory = Arc::new(ScriptedDirectory::new([
            Err(DiscoveryError::Status(502)),
            Ok(nodes(&["https://c"])),
            Ok(nodes(&["https://never"])),
        ]));
        let (refresher, pool, observer) = refresher(directory.clone(), &PoolConfig::default());

        let outcome = refresher.refresh_once().await;

        assert_eq!(outcome, RefreshOutcome::Updated(1));
        assert_eq!(directory.calls(), 2);
        assert_eq!(&*pool.snapshot(), &nodes(&["https://c"])[..]);
        assert_eq!(
            observer.events(),
            vec![
                Event::Error("Directory returned status 502".to_string()),
                Event::Update(nodes(&["https://c"])),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_to_defaults() {
        let directory = Arc::new(ScriptedDirectory::failing());
        let config = PoolConfig::default().with_network("testnet");
        let (refresher, pool, observer) = refresher(directory, &config);

        let outcome = refresher.refresh_once().await;

        let expected = nodes(&[
            "https://testnet.waxsweden.org",
            "https://testnet.wax.pink.gg",
            "https://testnet.wax.eosdetroit.io",
        ]);
        assert_eq!(outcome, RefreshOutcome::Fallback(FallbackKind::Default));
        assert!(pool.is_ready());
        assert_eq!(&*pool.snapshot(), &expected[..]);
        assert_eq!(observer.fallbacks(), vec![(FallbackKind::Default, expected)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_keeps_existing_list() {
        let directory = Arc::new(ScriptedDirectory::new([Ok(nodes(&["https://a", "https://b"]))]));
        let (refresher, pool, observer) = refresher(directory.clone(), &PoolConfig::default());

        assert_eq!(refresher.refresh_once().await, RefreshOutcome::Updated(2));
        // Script exhausted: every further attempt fails
        let outcome = refresher.refresh_once().await;

        assert_eq!(outcome, RefreshOutcome::Fallback(FallbackKind::Existing));
        assert_eq!(directory.calls(), 1 + MAX_RETRIES as usize);
        assert_eq!(&*pool.snapshot(), &nodes(&["https://a", "https://b"])[..]);
        assert_eq!(
            observer.fallbacks(),
            vec![(FallbackKind::Existing, nodes(&["https://a", "https://b"]))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_list_becomes_existing_on_next_failure() {
        let directory = Arc::new(ScriptedDirectory::failing());
        let (refresher, _, observer) = refresher(directory, &PoolConfig::default());

        refresher.refresh_once().await;
        refresher.refresh_once().await;

        let kinds: Vec<FallbackKind> = observer.fallbacks().into_iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![FallbackKind::Default, FallbackKind::Existing]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_without_defaults() {
        let directory = Arc::new(ScriptedDirectory::failing());
        let config = PoolConfig::default().with_node_type("light").with_network("devnet");
        let (refresher, pool, observer) = refresher(directory, &config);

        let outcome = refresher.refresh_once().await;

        assert_eq!(outcome, RefreshOutcome::Unavailable);
        assert!(pool.is_ready());
        assert!(pool.is_empty());
        assert_eq!(observer.fallbacks(), vec![(FallbackKind::Default, Vec::new())]);
        assert_eq!(observer.error_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_cycles_last_writer_wins() {
        // First cycle fails once and lands its list a second later; the
        // second cycle succeeds straight away in between.
        let directory = Arc::new(ScriptedDirectory::new([
            Err(DiscoveryError::Status(503)),
            Ok(nodes(&["https://a", "https://b", "https://c"])),
            Ok(nodes(&["https://x", "https://y"])),
        ]));
        let (refresher, pool, observer) = refresher(directory.clone(), &PoolConfig::default());
        let refresher = Arc::new(refresher);

        let slow = tokio::spawn({
            let refresher = refresher.clone();
            async move { refresher.refresh_once().await }
        });
        sleep(Duration::from_millis(10)).await;
        let fast = tokio::spawn({
            let refresher = refresher.clone();
            async move { refresher.refresh_once().await }
        });

        sleep(Duration::from_millis(100)).await;
        assert!(pool.is_ready());
        assert_eq!(&*pool.snapshot(), &nodes(&["https://a", "https://b", "https://c"])[..]);
        assert_eq!(pool.next_endpoint().as_deref(), Some("https://a"));
        assert_eq!(pool.next_endpoint().as_deref(), Some("https://b"));

        assert_eq!(fast.await.unwrap(), RefreshOutcome::Updated(3));
        assert_eq!(slow.await.unwrap(), RefreshOutcome::Updated(2));

        let lists =
            [nodes(&["https://a", "https://b", "https://c"]), nodes(&["https://x", "https://y"])];
        let live = pool.snapshot().to_vec();
        assert!(lists.contains(&live));
        assert_eq!(live, lists[1]);
        assert!(pool.is_ready());

        // Cursor left at 2 by the first list wraps onto the shorter one
        for _ in 0..5 {
            let node = pool.next_endpoint().unwrap();
            assert!(live.contains(&node));
        }

        assert_eq!(directory.calls(), 3);
        assert_eq!(
            observer.events().into_iter().filter(|e| matches!(e, Event::Update(_))).count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_ok_counts_as_failure() {
        let directory = Arc::new(ScriptedDirectory::new([Ok(Vec::new()), Ok(nodes(&["https://a"]))]));
        let (refresher, _, observer) = refresher(directory.clone(), &PoolConfig::default());

        assert_eq!(refresher.refresh_once().await, RefreshOutcome::Updated(1));
        assert_eq!(directory.calls(), 2);
        assert_eq!(observer.error_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_observer_does_not_abort_cycle() {
        struct PanickingObserver;
        impl PoolObserver for PanickingObserver {
            fn on_error(&self, _error: &DiscoveryError) {
                panic!("observer failure");
            }
        }

        let directory = Arc::new(ScriptedDirectory::failing());
        let pool = Arc::new(EndpointPool::new());
        let refresher = DiscoveryRefresher::new(
            directory.clone(),
            pool.clone(),
            Arc::new(PanickingObserver),
            &PoolConfig::default(),
        );

        let outcome = refresher.refresh_once().await;

        assert_eq!(outcome, RefreshOutcome::Fallback(FallbackKind::Default));
        assert_eq!(directory.calls(), 3);
        assert!(pool.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_recorded() {
        let registry = prometheus::Registry::new();
        let metrics = Arc::new(DiscoveryMetrics::new(&registry).unwrap());
        let directory = Arc::new(ScriptedDirectory::new([
            Err(DiscoveryError::Transport("timeout".to_string())),
            Ok(nodes(&["https://a", "https://b"])),
        ]));
        let pool = Arc::new(EndpointPool::new());
        let refresher =
            DiscoveryRefresher::new(directory, pool, Arc::new(NoopObserver), &PoolConfig::default())
                .with_metrics(metrics.clone());

        refresher.refresh_once().await;
        refresher.refresh_once().await;

        assert_eq!(metrics.directory_requests.with_label_values(&["success"]).get(), 1);
        assert_eq!(metrics.directory_requests.with_label_values(&["error"]).get(), 4);
        assert_eq!(metrics.fallbacks.with_label_values(&["existing"]).get(), 1);
        assert_eq!(metrics.live_endpoints.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_runs_immediately_then_on_interval() {
        let directory = Arc::new(ScriptedDirectory::always(nodes(&["https://a"])));
        let config = PoolConfig::default().with_update_interval(Duration::from_secs(30));
        let (refresher, pool, _) = refresher(directory.clone(), &config);

        let task = Arc::new(refresher).spawn();
        pool.wait_ready().await;
        assert_eq!(directory.calls(), 1);

        sleep(Duration::from_secs(29)).await;
        assert_eq!(directory.calls(), 1);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(directory.calls(), 2);

        sleep(Duration::from_secs(30)).await;
        assert_eq!(directory.calls(), 3);

        task.abort();
        sleep(Duration::from_millis(1)).await;
        assert!(task.is_finished());

        sleep(Duration::from_secs(120)).await;
        assert_eq!(directory.calls(), 3);
    }

    #[test]
    fn test_refresh_interval() {
        let directory = Arc::new(ScriptedDirectory::failing());
        let config = PoolConfig::default().with_update_interval(Duration::from_secs(60));
        let (refresher, _, _) = refresher(directory, &config);

        assert_eq!(refresher.refresh_interval(), Duration::from_secs(60));
    }
}
