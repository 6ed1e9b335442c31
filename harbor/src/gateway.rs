use crate::cluster::ClusterApi;
use crate::cluster::protocol::{EventList, PodList};
use crate::config::{Config, LogSourceKind};
use crate::errors::HarborError;
use crate::logs::source::{ClusterLogSource, HostLogSource, LogSource};
use crate::logs::{FetchSettings, LogAggregator};
use crate::status::{self, ShipmentEvents, ShipmentStatus};
use crate::topology::{self, DeploymentKey, Lookup, Topology};
use barge::{EndpointResolver, ResolvedEndpoint};
use std::sync::Arc;
use std::time::Duration;

/// Request pipeline: barge resolution, replica listing, log aggregation.
pub struct Harbor {
    resolver: Arc<EndpointResolver>,
    /// Client for cluster APIs, TLS verification per configuration
    cluster_client: reqwest::Client,
    /// Client for the container-log endpoints on replica hosts
    host_client: reqwest::Client,
    aggregator: LogAggregator,
    api_prefix: String,
    log_source: LogSourceKind,
    log_tail: u32,
    container_api_port: u16,
}

impl Harbor {
    pub fn new(config: &Config, resolver: Arc<EndpointResolver>) -> Result<Self, HarborError> {
        let cluster_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.cluster.strict_ssl)
            .timeout(Duration::from_secs(config.cluster.timeout_secs))
            .build()?;
        let host_client = reqwest::Client::builder().build()?;

        let aggregator = LogAggregator::new(FetchSettings {
            timeout: Duration::from_secs(config.logs.fetch_timeout_secs),
            retries: config.logs.fetch_retries,
        });

        Ok(Harbor {
            resolver,
            cluster_client,
            host_client,
            aggregator,
            api_prefix: config.cluster.api_prefix.clone(),
            log_source: config.logs.source,
            log_tail: config.logs.tail,
            container_api_port: config.logs.container_api_port,
        })
    }

    async fn cluster(&self, barge_id: &str) -> Result<(ResolvedEndpoint, ClusterApi), HarborError> {
        let endpoint = self.resolver.resolve(barge_id).await?;
        let cluster = ClusterApi::new(self.cluster_client.clone(), &endpoint, &self.api_prefix)?;
        Ok((endpoint, cluster))
    }

    /// Resolves the barge of `key` and lists the deployment's replicas.
    pub async fn resolve_and_fetch_topology(
        &self,
        key: &DeploymentKey,
    ) -> Result<(ResolvedEndpoint, Topology), HarborError> {
        let (endpoint, cluster) = self.cluster(&key.barge_id).await?;
        let topology = topology::list_replicas(&cluster, key, self.resolver.location()).await?;
        Ok((endpoint, topology))
    }

    /// Attaches logs read from the container-log endpoint of each host.
    pub async fn attach_logs_from_host_api(&self, topology: Topology) -> Lookup<Topology> {
        let source = LogSource::Host(HostLogSource::new(
            self.host_client.clone(),
            self.container_api_port,
            self.log_tail,
        ));
        self.aggregator.attach_logs(topology, &source).await
    }

    /// Attaches logs read from the cluster API behind `endpoint`.
    pub async fn attach_logs_from_cluster_api(
        &self,
        endpoint: &ResolvedEndpoint,
        topology: Topology,
    ) -> Result<Lookup<Topology>, HarborError> {
        let cluster = ClusterApi::new(self.cluster_client.clone(), endpoint, &self.api_prefix)?;
        let source = LogSource::Cluster(ClusterLogSource::new(
            cluster,
            topology.namespace.clone(),
            self.log_tail,
        ));
        Ok(self.aggregator.attach_logs(topology, &source).await)
    }

    /// Topology of `key` with the logs of every eligible container.
    pub async fn harbor(&self, key: &DeploymentKey) -> Result<Lookup<Topology>, HarborError> {
        let (endpoint, topology) = self.resolve_and_fetch_topology(key).await?;

        let use_host = match self.log_source {
            LogSourceKind::Host => true,
            LogSourceKind::Cluster => false,
            LogSourceKind::Auto => endpoint.is_dynamically_managed,
        };
        tracing::debug!(
            barge = %key.barge_id,
            namespace = %topology.namespace,
            replicas = topology.replicas.len(),
            host_api = use_host,
            "Attaching container logs"
        );

        if use_host {
            Ok(self.attach_logs_from_host_api(topology).await)
        } else {
            self.attach_logs_from_cluster_api(&endpoint, topology).await
        }
    }

    pub async fn shipment_status(&self, key: &DeploymentKey) -> Result<ShipmentStatus, HarborError> {
        let (_, cluster) = self.cluster(&key.barge_id).await?;
        let namespace = key.namespace();
        let pods: PodList = cluster.get_json(cluster.pods_url(&namespace)?).await?;
        Ok(status::summarize_status(namespace, pods))
    }

    pub async fn shipment_events(&self, key: &DeploymentKey) -> Result<ShipmentEvents, HarborError> {
        let (_, cluster) = self.cluster(&key.barge_id).await?;
        let namespace = key.namespace();
        let events: EventList = cluster.get_json(cluster.events_url(&namespace)?).await?;
        Ok(status::summarize_events(namespace, events))
    }
}
