//! Live endpoint list with round-robin selection and a readiness gate
//!
//! The list is swapped as a whole on every refresh; readers always see either
//! the old list or the new one. The rotation cursor lives under the same lock
//! and is re-normalized against whatever list is current when it is read.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug)]
struct Rotation {
    nodes: Arc<[String]>,
    cursor: usize,
}

/// Endpoint list shared between the refresher and callers
#[derive(Debug)]
pub struct EndpointPool {
    rotation: RwLock<Rotation>,
    ready: watch::Sender<bool>,
}

impl Default for EndpointPool {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointPool {
    /// Create an empty, not-yet-ready pool
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self { rotation: RwLock::new(Rotation { nodes: Arc::from(Vec::new()), cursor: 0 }), ready }
    }

    /// Replace the live list
    ///
    /// The cursor is kept and wraps against the new length on the next read.
    pub fn replace(&self, nodes: Vec<String>) {
        let mut rotation = self.rotation.write();
        debug!(old_count = rotation.nodes.len(), new_count = nodes.len(), "Replacing endpoint list");
        rotation.nodes = Arc::from(nodes);
    }

    /// Snapshot of the live list
    pub fn snapshot(&self) -> Arc<[String]> {
        self.rotation.read().nodes.clone()
    }

    /// Number of live endpoints
    pub fn len(&self) -> usize {
        self.rotation.read().nodes.len()
    }

    /// Whether the live list is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the next endpoint using round-robin selection
    ///
    /// Returns `None` only when the list is empty.
    pub fn next_endpoint(&self) -> Option<String> {
        let mut rotation = self.rotation.write();
        let len = rotation.nodes.len();
        if len == 0 {
            return None;
        }

        let index = rotation.cursor % len;
        rotation.cursor = (index + 1) % len;
        Some(rotation.nodes[index].clone())
    }

    /// Open the readiness gate; later calls are no-ops
    pub fn mark_ready(&self) {
        self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
    }

    /// Whether the first refresh cycle has settled
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the first refresh cycle has settled
    ///
    /// Every waiter is released when the gate opens.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}
