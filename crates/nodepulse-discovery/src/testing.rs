//! Test doubles shared by unit tests

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{
    directory::{DirectoryClient, DirectoryQuery},
    error::{DiscoveryError, Result},
    hooks::{FallbackKind, PoolObserver},
};

pub(crate) fn nodes(urls: &[&str]) -> Vec<String> {
    urls.iter().map(|url| url.to_string()).collect()
}

/// Directory that replays a fixed script of responses
///
/// Once the script runs out it answers with `otherwise`, or a transport error
/// when that is unset.
#[derive(Debug, Default)]
pub(crate) struct ScriptedDirectory {
    script: Mutex<VecDeque<Result<Vec<String>>>>,
    otherwise: Option<Vec<String>>,
    queries: Mutex<Vec<(Instant, DirectoryQuery)>>,
}

impl ScriptedDirectory {
    pub(crate) fn new(script: impl IntoIterator<Item = Result<Vec<String>>>) -> Self {
        Self { script: Mutex::new(script.into_iter().collect()), ..Default::default() }
    }

    pub(crate) fn failing() -> Self {
        Self::default()
    }

    pub(crate) fn always(nodes: Vec<String>) -> Self {
        Self { otherwise: Some(nodes), ..Default::default() }
    }

    pub(crate) fn calls(&self) -> usize {
        self.queries.lock().len()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.queries.lock().iter().map(|(at, _)| *at).collect()
    }

    pub(crate) fn queries(&self) -> Vec<DirectoryQuery> {
        self.queries.lock().iter().map(|(_, query)| query.clone()).collect()
    }
}

#[async_trait]
impl DirectoryClient for ScriptedDirectory {
    async fn fetch(&self, query: &DirectoryQuery) -> Result<Vec<String>> {
        self.queries.lock().push((Instant::now(), query.clone()));

        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }

        match &self.otherwise {
            Some(nodes) => Ok(nodes.clone()),
            None => Err(DiscoveryError::Transport("connection refused".to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Update(Vec<String>),
    Error(String),
    Fallback(FallbackKind, Vec<String>),
}

/// Observer that records every notification in order
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub(crate) fn error_count(&self) -> usize {
        self.events.lock().iter().filter(|e| matches!(e, Event::Error(_))).count()
    }

    pub(crate) fn fallbacks(&self) -> Vec<(FallbackKind, Vec<String>)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Fallback(kind, nodes) => Some((*kind, nodes.clone())),
                _ => None,
            })
            .collect()
    }
}

impl PoolObserver for RecordingObserver {
    fn on_update(&self, nodes: &[String]) {
        self.events.lock().push(Event::Update(nodes.to_vec()));
    }

    fn on_error(&self, error: &DiscoveryError) {
        self.events.lock().push(Event::Error(error.to_string()));
    }

    fn on_fallback(&self, kind: FallbackKind, nodes: &[String]) {
        self.events.lock().push(Event::Fallback(kind, nodes.to_vec()));
    }
}
