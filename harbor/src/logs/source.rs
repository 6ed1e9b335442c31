use super::framing;
use crate::cluster::{ClusterApi, ClusterError};
use crate::topology::{ContainerDescriptor, ReplicaDescriptor};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("HTTP Fetch Error {0}")]
    Status(StatusCode),

    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Cluster(#[from] ClusterError),

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Invalid log target: {0}")]
    InvalidTarget(String),

    #[error("Log fetch task failed: {0}")]
    Task(String),
}

/// Reads container logs over the container-log HTTP endpoint each replica
/// host exposes.
#[derive(Clone, Debug)]
pub struct HostLogSource {
    client: reqwest::Client,
    port: u16,
    tail: u32,
}

impl HostLogSource {
    pub fn new(client: reqwest::Client, port: u16, tail: u32) -> Self {
        HostLogSource { client, port, tail }
    }

    pub fn container_logs_url(&self, host: &str, container_id: &str) -> Result<Url, FetchError> {
        let invalid = || FetchError::InvalidTarget(format!("{host}/{container_id}"));

        let mut url = Url::parse(&format!("http://{host}:{}/", self.port)).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["containers", container_id, "logs"]);
        url.query_pairs_mut()
            .append_pair("stdout", "1")
            .append_pair("stderr", "1")
            .append_pair("timestamps", "1")
            .append_pair("tail", &self.tail.to_string());
        Ok(url)
    }

    /// The logs URL kept open for new output, handed to clients that tail a
    /// container themselves.
    pub fn container_stream_url(&self, host: &str, container_id: &str) -> Result<Url, FetchError> {
        let mut url = self.container_logs_url(host, container_id)?;
        url.query_pairs_mut().append_pair("follow", "1");
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> Result<Vec<String>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.bytes().await?;
        Ok(framing::decode_lines(&body))
    }
}

/// Reads container logs through the log sub-resource of the cluster API.
#[derive(Clone, Debug)]
pub struct ClusterLogSource {
    cluster: ClusterApi,
    namespace: String,
    tail: u32,
}

impl ClusterLogSource {
    pub fn new(cluster: ClusterApi, namespace: String, tail: u32) -> Self {
        ClusterLogSource {
            cluster,
            namespace,
            tail,
        }
    }

    async fn fetch(&self, url: Url) -> Result<Vec<String>, FetchError> {
        let text = self.cluster.log(url).await?;
        Ok(framing::split_lines(&text))
    }
}

#[derive(Clone, Debug)]
pub enum LogSource {
    Host(HostLogSource),
    Cluster(ClusterLogSource),
}

impl LogSource {
    pub fn name(&self) -> &'static str {
        match self {
            LogSource::Host(_) => "host",
            LogSource::Cluster(_) => "cluster",
        }
    }

    /// Where to fetch the logs of `container`, or `None` when it is not
    /// eligible for fetching from this source.
    ///
    /// Containers that have not started are never eligible. The cluster API
    /// additionally only serves logs of running replicas.
    pub fn target(
        &self,
        replica: &ReplicaDescriptor,
        container: &ContainerDescriptor,
    ) -> Option<Result<Url, FetchError>> {
        if container.is_pending() {
            return None;
        }

        match self {
            LogSource::Host(host) => {
                if container.host_address.is_empty() {
                    return None;
                }
                Some(host.container_logs_url(&container.host_address, &container.container_id))
            }
            LogSource::Cluster(cluster) => {
                if replica.phase != "running" {
                    return None;
                }
                Some(
                    cluster
                        .cluster
                        .pod_log_url(
                            &cluster.namespace,
                            &replica.pod_name,
                            &container.name,
                            cluster.tail,
                        )
                        .map_err(FetchError::from),
                )
            }
        }
    }

    /// Streaming logs URL advertised for `container`. Only the host source
    /// exposes one, and only for started containers with a known host.
    pub fn stream_url(&self, container: &ContainerDescriptor) -> Option<Url> {
        match self {
            LogSource::Host(host) if !container.is_pending() && !container.host_address.is_empty() => {
                host.container_stream_url(&container.host_address, &container.container_id)
                    .ok()
            }
            _ => None,
        }
    }

    pub async fn fetch(&self, url: Url) -> Result<Vec<String>, FetchError> {
        match self {
            LogSource::Host(host) => host.fetch(url).await,
            LogSource::Cluster(cluster) => cluster.fetch(url).await,
        }
    }
}
