//! Prometheus metrics for endpoint discovery

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::hooks::FallbackKind;

/// Discovery metrics
#[derive(Debug, Clone)]
pub struct DiscoveryMetrics {
    /// Directory attempts, by outcome
    pub directory_requests: IntCounterVec,
    /// Refresh cycles that fell back, by kind
    pub fallbacks: IntCounterVec,
    /// Current number of live endpoints
    pub live_endpoints: IntGauge,
    /// Endpoints handed out to callers
    pub selections: IntCounter,
}

impl DiscoveryMetrics {
    /// Create and register discovery metrics
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let directory_requests = IntCounterVec::new(
            Opts::new(
                "nodepulse_directory_requests_total",
                "Total number of directory API attempts",
            ),
            &["status"],
        )?;
        registry.register(Box::new(directory_requests.clone()))?;

        let fallbacks = IntCounterVec::new(
            Opts::new(
                "nodepulse_fallbacks_total",
                "Total number of refresh cycles that fell back to an existing or default list",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(fallbacks.clone()))?;

        let live_endpoints =
            IntGauge::new("nodepulse_live_endpoints", "Current number of live endpoints")?;
        registry.register(Box::new(live_endpoints.clone()))?;

        let selections = IntCounter::new(
            "nodepulse_endpoint_selections_total",
            "Total number of endpoints handed out by round-robin selection",
        )?;
        registry.register(Box::new(selections.clone()))?;

        Ok(Self { directory_requests, fallbacks, live_endpoints, selections })
    }

    /// Record a directory attempt
    pub fn record_directory_request(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.directory_requests.with_label_values(&[status]).inc();
    }

    /// Record a fallback
    pub fn record_fallback(&self, kind: FallbackKind) {
        self.fallbacks.with_label_values(&[kind.as_str()]).inc();
    }

    /// Set the number of live endpoints
    pub fn set_live_endpoints(&self, count: usize) {
        self.live_endpoints.set(count as i64);
    }

    /// Record an endpoint selection
    pub fn record_selection(&self) {
        self.selections.inc();
    }
}
