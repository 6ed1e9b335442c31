//! Subset of the cluster API's pod and event objects that the gateway reads.
//!
//! Unknown fields are ignored. Everything the gateway does not strictly need
//! is optional so partially populated objects (unscheduled pods, events
//! without a source) still decode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Container runtime prefix on container ids, e.g. `docker://abc123`.
const RUNTIME_SEPARATOR: &str = "://";

/// Id reported for containers that have not started yet.
pub const PENDING_CONTAINER_ID: &str = "pending";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PodList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default, rename = "hostIP")]
    pub host_ip: Option<String>,
    #[serde(default, rename = "podIP")]
    pub pod_ip: Option<String>,
    #[serde(default)]
    pub conditions: Vec<PodCondition>,
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
}

impl PodStatus {
    /// Lower-cased phase, `unknown` when the pod has not reported one.
    pub fn phase(&self) -> String {
        self.phase
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| "unknown".into())
    }
}

/// A pod condition, passed through to clients with its remaining fields.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PodCondition {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, rename = "containerID")]
    pub container_id: Option<String>,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub restart_count: u32,
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub last_state: Option<Map<String, Value>>,
}

impl ContainerStatus {
    /// Container id without its runtime prefix, or [`PENDING_CONTAINER_ID`].
    pub fn id(&self) -> String {
        match self.container_id.as_deref() {
            Some(id) if !id.is_empty() => match id.split_once(RUNTIME_SEPARATOR) {
                Some((_, bare)) => bare.to_string(),
                None => id.to_string(),
            },
            _ => PENDING_CONTAINER_ID.to_string(),
        }
    }

    /// Name of the current state (`running`, `waiting`, `terminated`).
    pub fn state_name(&self) -> String {
        self.state
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| "unknown".into())
    }

    /// Last state, omitted when the container has never restarted.
    pub fn last_state(&self) -> Option<&Map<String, Value>> {
        self.last_state.as_ref().filter(|state| !state.is_empty())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct EventList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<Event>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub first_timestamp: Option<String>,
    #[serde(default)]
    pub last_timestamp: Option<String>,
}
