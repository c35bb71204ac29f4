//! Directory API client
//!
//! The directory is a remote HTTP service answering
//! `GET <api_url>?type=<node_type>&network=<network>&count=<node_count>` with a
//! JSON array of `{ "url": "..." }` records.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::PoolConfig,
    error::{DiscoveryError, Result},
};

/// Query parameters sent to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryQuery {
    #[serde(rename = "type")]
    pub node_type: String,
    pub network: String,
    pub count: u32,
}

impl From<&PoolConfig> for DirectoryQuery {
    fn from(config: &PoolConfig) -> Self {
        Self {
            node_type: config.node_type.clone(),
            network: config.network.clone(),
            count: config.node_count,
        }
    }
}

/// One record of a directory response; fields other than `url` are ignored
#[derive(Debug, Deserialize)]
struct NodeRecord {
    url: String,
}

/// Source of candidate endpoints for a pool
#[async_trait]
pub trait DirectoryClient: Send + Sync + fmt::Debug {
    /// Fetch the recommended endpoints for a query
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError` on transport failure, a non-200 status, or a
    /// body that is empty or not a list of `{url}` records. An `Ok` result is
    /// never empty.
    async fn fetch(&self, query: &DirectoryQuery) -> Result<Vec<String>>;
}

/// Directory client that calls the directory API over HTTP
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    http_client: HttpClient,
    api_url: String,
}

impl HttpDirectory {
    /// Create a new HTTP directory client
    ///
    /// # Arguments
    ///
    /// * `api_url` - Address of the directory API
    /// * `timeout` - Transport timeout applied to every request
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_url = api_url.into();
        url::Url::parse(&api_url)?;

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| DiscoveryError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, api_url })
    }

    /// Create a client from pool configuration
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        Self::new(config.api_url.clone(), config.request_timeout())
    }

    /// Directory API address
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectory {
    async fn fetch(&self, query: &DirectoryQuery) -> Result<Vec<String>> {
        debug!(
            api_url = %self.api_url,
            node_type = %query.node_type,
            network = %query.network,
            count = query.count,
            "Querying directory"
        );

        let response = self.http_client.get(&self.api_url).query(query).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DiscoveryError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_nodes(&body)
    }
}

/// Decode a directory response body into endpoint URLs, preserving order
pub(crate) fn parse_nodes(body: &[u8]) -> Result<Vec<String>> {
    let records: Vec<NodeRecord> = serde_json::from_slice(body)?;

    if records.is_empty() {
        return Err(DiscoveryError::EmptyResponse);
    }

    Ok(records.into_iter().map(|record| record.url).collect())
}
