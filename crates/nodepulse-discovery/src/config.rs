//! Configuration types for the endpoint pool
//!
//! Configuration is layered: serde defaults, then an optional config file, then
//! environment variables prefixed with `NODEPULSE` (e.g. `NODEPULSE__NETWORK=testnet`).

use std::{fmt, path::Path, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, Result};

/// Maximum directory attempts per refresh cycle
pub const MAX_RETRIES: u32 = 3;

/// Constant delay between directory attempts within a cycle
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Endpoint pool configuration
///
/// Immutable once handed to a [`NodePool`](crate::NodePool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Category of endpoint requested from the directory (e.g. "hyperion", "atomic")
    #[serde(default = "default_node_type")]
    pub node_type: String,

    /// Network the endpoints serve (e.g. "mainnet", "testnet")
    #[serde(default = "default_network")]
    pub network: String,

    /// How many candidate endpoints to ask the directory for
    #[serde(default = "default_node_count")]
    pub node_count: u32,

    /// Background refresh period (in milliseconds)
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Address of the directory API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Threshold for which discovery outcomes this pool reports
    #[serde(default)]
    pub log_level: LogLevel,

    /// Transport timeout for a single directory request (in milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            node_type: default_node_type(),
            network: default_network(),
            node_count: default_node_count(),
            update_interval_ms: default_update_interval_ms(),
            api_url: default_api_url(),
            log_level: LogLevel::default(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_node_type() -> String {
    "hyperion".to_string()
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_node_count() -> u32 {
    3
}

fn default_update_interval_ms() -> u64 {
    30_000 // 30 seconds
}

fn default_api_url() -> String {
    "http://127.0.0.1:3000/nodes".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl PoolConfig {
    /// Load configuration from a file with environment overrides
    ///
    /// The file is optional; a missing file yields the defaults plus any
    /// `NODEPULSE__*` environment variables.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let builder =
            config::Config::builder().add_source(config::File::from(path.as_ref()).required(false));

        let builder = builder.add_source(
            config::Environment::with_prefix("NODEPULSE").separator("__").try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| DiscoveryError::Config(format!("Failed to build config: {}", e)))?;

        config
            .try_deserialize()
            .map_err(|e| DiscoveryError::Config(format!("Failed to deserialize config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.node_type.trim().is_empty() {
            return Err(DiscoveryError::Config("node_type must not be empty".to_string()));
        }

        if self.network.trim().is_empty() {
            return Err(DiscoveryError::Config("network must not be empty".to_string()));
        }

        if self.node_count == 0 {
            return Err(DiscoveryError::Config("node_count must be at least 1".to_string()));
        }

        if self.update_interval_ms == 0 {
            return Err(DiscoveryError::Config("update_interval_ms must be positive".to_string()));
        }

        if self.request_timeout_ms == 0 {
            return Err(DiscoveryError::Config("request_timeout_ms must be positive".to_string()));
        }

        let url = url::Url::parse(&self.api_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DiscoveryError::InvalidUrl(format!(
                "api_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        Ok(())
    }

    /// Set the node type
    pub fn with_node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    /// Set the network
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Set the number of endpoints requested from the directory
    pub fn with_node_count(mut self, node_count: u32) -> Self {
        self.node_count = node_count;
        self
    }

    /// Set the background refresh period
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the directory API address
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Set the reporting threshold
    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    /// Set the per-request transport timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Background refresh period
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Per-request transport timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Reporting threshold, from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    /// Whether an outcome at `level` passes this threshold
    pub fn allows(self, level: tracing::Level) -> bool {
        let rank = if level == tracing::Level::ERROR {
            LogLevel::Error
        } else if level == tracing::Level::WARN {
            LogLevel::Warn
        } else if level == tracing::Level::INFO {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        rank <= self
    }

    /// Lowercase name, usable as an `EnvFilter` directive
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(DiscoveryError::Config(format!("Unknown log level: {}", other))),
        }
    }
}
