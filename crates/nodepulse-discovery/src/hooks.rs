//! Observer hooks for discovery outcomes
//!
//! A [`PoolObserver`] is told about every discovery outcome: a successful
//! update, each failed attempt, and each cycle that ended in a fallback.
//! All methods default to no-ops, so an observer implements only what it needs.

use std::{fmt, sync::Arc};

use crate::error::DiscoveryError;

/// Which list a failed refresh cycle fell back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackKind {
    /// The list from an earlier cycle was kept
    Existing,
    /// The compiled-in default list was installed
    Default,
}

impl FallbackKind {
    /// Tag reported to observers and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackKind::Existing => "existing",
            FallbackKind::Default => "default",
        }
    }
}

impl fmt::Display for FallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives discovery outcomes from a pool
///
/// Methods are called synchronously from the refresh cycle and should return
/// quickly. A panicking observer is contained: the panic is logged and the
/// cycle carries on.
pub trait PoolObserver: Send + Sync {
    /// A refresh cycle replaced the live list with `nodes`
    fn on_update(&self, _nodes: &[String]) {}

    /// A single directory attempt failed
    fn on_error(&self, _error: &DiscoveryError) {}

    /// A refresh cycle exhausted its retries and fell back to `nodes`
    fn on_fallback(&self, _kind: FallbackKind, _nodes: &[String]) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PoolObserver for NoopObserver {}

type UpdateFn = Arc<dyn Fn(&[String]) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&DiscoveryError) + Send + Sync>;
type FallbackFn = Arc<dyn Fn(FallbackKind, &[String]) + Send + Sync>;

/// Observer assembled from closures
///
/// ```
/// use nodepulse_discovery::FnObserver;
///
/// let observer = FnObserver::new()
///     .with_on_update(|nodes| println!("nodes: {:?}", nodes))
///     .with_on_fallback(|kind, _| eprintln!("fell back to {} nodes", kind));
/// ```
#[derive(Clone, Default)]
pub struct FnObserver {
    update: Option<UpdateFn>,
    error: Option<ErrorFn>,
    fallback: Option<FallbackFn>,
}

impl FnObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after each successful update
    pub fn with_on_update(mut self, f: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
        self.update = Some(Arc::new(f));
        self
    }

    /// Called after each failed directory attempt
    pub fn with_on_error(mut self, f: impl Fn(&DiscoveryError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    /// Called after each cycle that fell back
    pub fn with_on_fallback(
        mut self,
        f: impl Fn(FallbackKind, &[String]) + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for FnObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver")
            .field("on_update", &self.update.is_some())
            .field("on_error", &self.error.is_some())
            .field("on_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl PoolObserver for FnObserver {
    fn on_update(&self, nodes: &[String]) {
        if let Some(f) = &self.update {
            f(nodes);
        }
    }

    fn on_error(&self, error: &DiscoveryError) {
        if let Some(f) = &self.error {
            f(error);
        }
    }

    fn on_fallback(&self, kind: FallbackKind, nodes: &[String]) {
        if let Some(f) = &self.fallback {
            f(kind, nodes);
        }
    }
}
