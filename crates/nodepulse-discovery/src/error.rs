//! Error types for endpoint discovery

use thiserror::Error;

/// Result type for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur while discovering or selecting endpoints
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Network failure or timeout talking to the directory API
    #[error("Transport error: {0}")]
    Transport(String),

    /// Directory API answered with something other than 200
    #[error("Directory returned status {0}")]
    Status(u16),

    /// Directory API answered with an empty list
    #[error("No nodes received from directory")]
    EmptyResponse,

    /// Directory API answered with a body that is not a list of `{url}` records
    #[error("Malformed directory response: {0}")]
    MalformedResponse(String),

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No live endpoints and no defaults for the configured node type/network
    #[error("No endpoints available for {node_type}/{network}")]
    NoEndpoints { node_type: String, network: String },
}

impl From<url::ParseError> for DiscoveryError {
    fn from(e: url::ParseError) -> Self {
        DiscoveryError::InvalidUrl(e.to_string())
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DiscoveryError::MalformedResponse(e.to_string())
        } else {
            DiscoveryError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(e: serde_json::Error) -> Self {
        DiscoveryError::MalformedResponse(e.to_string())
    }
}
