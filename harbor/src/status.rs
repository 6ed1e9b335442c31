//! Client-facing summaries of a shipment's pods and events.

use crate::cluster::protocol::{EventList, PodCondition, PodList};
use serde::Serialize;
use serde_json::{Map, Value};

const UNKNOWN_PHASE: &str = "Unknown";
const RUNNING_PHASE: &str = "Running";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentStatus {
    pub namespace: String,
    pub version: Option<String>,
    pub status: StatusSummary,
    pub average_restarts: f64,
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub phase: String,
    /// Conditions other than a healthy `Ready`
    pub conditions: Vec<PodCondition>,
    pub containers: Vec<ContainerStatusView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatusView {
    pub id: String,
    pub host: Option<String>,
    pub pod_ip: Option<String>,
    pub replica: String,
    pub image: String,
    pub ready: bool,
    pub restarts: u32,
    pub state: Map<String, Value>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_state: Option<Map<String, Value>>,
}

pub fn summarize_status(namespace: String, pods: PodList) -> ShipmentStatus {
    let replicas = pods.items.len();
    let mut total_restarts: u64 = 0;
    let mut summary = StatusSummary {
        phase: UNKNOWN_PHASE.into(),
        conditions: Vec::new(),
        containers: Vec::new(),
    };

    for pod in pods.items {
        let phase = pod.status.phase.as_deref().unwrap_or(UNKNOWN_PHASE);
        // The first phase seen sticks unless a later replica is not running
        if summary.phase == UNKNOWN_PHASE || phase != RUNNING_PHASE {
            summary.phase = phase.to_string();
        }

        summary.conditions.extend(
            pod.status
                .conditions
                .iter()
                .filter(|c| !(c.kind == "Ready" && c.is_true()))
                .cloned(),
        );

        for container in &pod.status.container_statuses {
            total_restarts += u64::from(container.restart_count);
            summary.containers.push(ContainerStatusView {
                id: container.id(),
                host: pod.status.host_ip.clone(),
                pod_ip: pod.status.pod_ip.clone(),
                replica: pod.metadata.name.clone(),
                image: container.image.clone(),
                ready: container.ready,
                restarts: container.restart_count,
                state: container.state.clone(),
                status: container.state_name(),
                last_state: container.last_state().cloned(),
            });
        }
    }

    let average_restarts = if replicas == 0 {
        0.0
    } else {
        total_restarts as f64 / replicas as f64
    };

    ShipmentStatus {
        namespace,
        version: pods.metadata.resource_version,
        status: summary,
        average_restarts,
    }
}

#[derive(Debug, Serialize)]
pub struct ShipmentEvents {
    pub namespace: String,
    pub version: Option<String>,
    pub events: Vec<EventView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub count: Option<u64>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub source: Option<Value>,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}

pub fn summarize_events(namespace: String, events: EventList) -> ShipmentEvents {
    ShipmentEvents {
        namespace,
        version: events.metadata.resource_version,
        events: events
            .items
            .into_iter()
            .map(|event| EventView {
                kind: event.kind,
                count: event.count,
                reason: event.reason,
                message: event.message,
                source: event.source,
                first_timestamp: event.first_timestamp,
                last_timestamp: event.last_timestamp,
            })
            .collect(),
    }
}
