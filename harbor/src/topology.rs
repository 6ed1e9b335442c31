//! Replica and container layout of one deployed shipment.

use crate::cluster::protocol::{PENDING_CONTAINER_ID, Pod, PodList};
use crate::cluster::{ClusterApi, ClusterError};
use serde::Serialize;

/// Identifies one deployment: a shipment environment on a barge.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeploymentKey {
    pub barge_id: String,
    pub shipment_id: String,
    pub environment_id: String,
}

impl DeploymentKey {
    pub fn new<B, S, E>(barge_id: B, shipment_id: S, environment_id: E) -> Self
    where
        B: Into<String>,
        S: Into<String>,
        E: Into<String>,
    {
        DeploymentKey {
            barge_id: barge_id.into(),
            shipment_id: shipment_id.into(),
            environment_id: environment_id.into(),
        }
    }

    /// Cluster namespace holding the deployment's replicas.
    pub fn namespace(&self) -> String {
        format!("{}-{}", self.shipment_id, self.environment_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDescriptor {
    #[serde(rename = "id")]
    pub container_id: String,
    pub name: String,
    pub image: String,
    #[serde(rename = "host")]
    pub host_address: String,
    #[serde(rename = "replica")]
    pub pod_name: String,
    pub state: String,
    pub restart_count: u32,
    /// Follow-mode logs URL for clients that tail the container directly
    #[serde(rename = "log_stream", skip_serializing_if = "Option::is_none")]
    pub log_stream: Option<String>,
    /// Written exactly once by log aggregation; absent when never fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,
}

impl ContainerDescriptor {
    pub fn is_pending(&self) -> bool {
        self.container_id == PENDING_CONTAINER_ID
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReplicaDescriptor {
    #[serde(rename = "host")]
    pub host_address: String,
    #[serde(rename = "name")]
    pub pod_name: String,
    pub phase: String,
    pub provider: String,
    pub containers: Vec<ContainerDescriptor>,
}

impl ReplicaDescriptor {
    fn from_pod(pod: Pod, provider: &str) -> Self {
        let host_address = pod.status.host_ip.clone().unwrap_or_default();
        let phase = pod.status.phase();
        let pod_name = pod.metadata.name;

        let containers = pod
            .status
            .container_statuses
            .iter()
            .map(|status| ContainerDescriptor {
                container_id: status.id(),
                name: status.name.clone(),
                image: status.image.clone(),
                host_address: host_address.clone(),
                pod_name: pod_name.clone(),
                state: status.state_name(),
                restart_count: status.restart_count,
                log_stream: None,
                logs: None,
            })
            .collect();

        ReplicaDescriptor {
            host_address,
            pod_name,
            phase,
            provider: provider.to_string(),
            containers,
        }
    }
}

/// All replicas of a deployment, in the order the cluster listed them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Topology {
    pub namespace: String,
    pub replicas: Vec<ReplicaDescriptor>,
}

impl Topology {
    pub fn from_pods(namespace: String, pods: PodList, provider: &str) -> Self {
        let replicas = pods
            .items
            .into_iter()
            .map(|pod| ReplicaDescriptor::from_pod(pod, provider))
            .collect();
        Topology {
            namespace,
            replicas,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn containers(&self) -> impl Iterator<Item = &ContainerDescriptor> {
        self.replicas.iter().flat_map(|r| r.containers.iter())
    }

    /// First container with `container_id` whose logs are still unset.
    pub fn unset_container_mut(&mut self, container_id: &str) -> Option<&mut ContainerDescriptor> {
        self.replicas
            .iter_mut()
            .flat_map(|r| r.containers.iter_mut())
            .find(|c| c.container_id == container_id && c.logs.is_none())
    }
}

/// Result of a lookup that distinguishes "nothing deployed" from failure.
#[derive(Debug, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

/// Lists the replicas of `key` from the cluster API.
pub async fn list_replicas(
    cluster: &ClusterApi,
    key: &DeploymentKey,
    provider: &str,
) -> Result<Topology, ClusterError> {
    let namespace = key.namespace();
    let pods: PodList = cluster.get_json(cluster.pods_url(&namespace)?).await?;
    tracing::debug!(namespace = %namespace, replicas = pods.items.len(), "Listed replicas");
    Ok(Topology::from_pods(namespace, pods, provider))
}
