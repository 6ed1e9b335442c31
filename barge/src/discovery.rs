//! Dynamic lookup of the API endpoints serving a barge.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("discovery service responded with {0}")]
    Status(StatusCode),

    #[error("discovery URL cannot be used as a base: {0}")]
    InvalidBaseUrl(String),

    #[error("{0}")]
    Other(String),
}

/// Maps a workload to the ordered list of endpoint URLs currently serving it.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(
        &self,
        workload: &str,
        environment: &str,
        location: &str,
    ) -> Result<Vec<String>, DiscoveryError>;
}

/// One element of the inventory response. Either a plain URL or an instance
/// record from which a URL is assembled.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(untagged)]
enum InstanceRecord {
    Url(String),
    Instance {
        address: String,
        port: Option<u16>,
        #[serde(default = "default_scheme")]
        scheme: String,
    },
}

impl InstanceRecord {
    fn into_endpoint(self) -> String {
        match self {
            InstanceRecord::Url(url) => url,
            InstanceRecord::Instance {
                address,
                port: Some(port),
                scheme,
            } => format!("{scheme}://{address}:{port}"),
            InstanceRecord::Instance {
                address,
                port: None,
                scheme,
            } => format!("{scheme}://{address}"),
        }
    }
}

fn default_scheme() -> String {
    "http".into()
}

/// Discovery backed by the instance inventory HTTP service.
pub struct InventoryDiscovery {
    client: reqwest::Client,
    base_url: Url,
}

impl InventoryDiscovery {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(InventoryDiscovery { client, base_url })
    }

    fn instances_url(
        &self,
        workload: &str,
        environment: &str,
        location: &str,
    ) -> Result<Url, DiscoveryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DiscoveryError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["instances", workload, environment]);
        url.query_pairs_mut()
            .append_pair("q", &format!("location:{location} AND NOT offline:true"));
        Ok(url)
    }
}

#[async_trait]
impl Discovery for InventoryDiscovery {
    async fn discover(
        &self,
        workload: &str,
        environment: &str,
        location: &str,
    ) -> Result<Vec<String>, DiscoveryError> {
        let url = self.instances_url(workload, environment, location)?;
        tracing::debug!(%url, "Querying instance inventory");

        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::OK => {
                let records = response.json::<Vec<InstanceRecord>>().await?;
                Ok(records
                    .into_iter()
                    .map(InstanceRecord::into_endpoint)
                    .collect())
            }
            // The inventory answers 404 for a workload it has never seen
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status => Err(DiscoveryError::Status(status)),
        }
    }
}
