use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Log fetch timeout cannot be 0")]
    InvalidFetchTimeout,

    #[error("Log tail size cannot be 0")]
    InvalidTail,

    #[error("Cluster API timeout cannot be 0")]
    InvalidClusterTimeout,
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 5061,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// How the cluster API of a resolved barge is called
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ClusterConfig {
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Verify TLS certificates of cluster API endpoints
    #[serde(default)]
    pub strict_ssl: bool,
    #[serde(default = "default_cluster_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            api_prefix: default_api_prefix(),
            strict_ssl: false,
            timeout_secs: default_cluster_timeout_secs(),
        }
    }
}

/// Where container logs are read from
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogSourceKind {
    /// Host API for discovered barges, cluster API for static ones
    #[default]
    Auto,
    /// Container-log HTTP endpoint on each replica's host
    Host,
    /// Log sub-resource of the cluster API
    Cluster,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LogsConfig {
    #[serde(default)]
    pub source: LogSourceKind,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Extra attempts per container after a failed fetch
    #[serde(default)]
    pub fetch_retries: u32,
    /// Number of trailing log lines requested per container
    #[serde(default = "default_tail")]
    pub tail: u32,
    #[serde(default = "default_container_api_port")]
    pub container_api_port: u16,
}

impl Default for LogsConfig {
    fn default() -> Self {
        LogsConfig {
            source: LogSourceKind::default(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_retries: 0,
            tail: default_tail(),
            container_api_port: default_container_api_port(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub logs: LogsConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.cluster.timeout_secs == 0 {
            return Err(ValidationError::InvalidClusterTimeout);
        }
        if self.logs.fetch_timeout_secs == 0 {
            return Err(ValidationError::InvalidFetchTimeout);
        }
        if self.logs.tail == 0 {
            return Err(ValidationError::InvalidTail);
        }
        if self.logs.container_api_port == 0 {
            return Err(ValidationError::InvalidPort);
        }

        Ok(())
    }
}

fn default_api_prefix() -> String {
    "/api/v1".into()
}

fn default_cluster_timeout_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_tail() -> u32 {
    500
}

fn default_container_api_port() -> u16 {
    4545
}
