//! Concurrent per-container log retrieval and merge.
//!
//! Every eligible container of a topology gets its own fetch task. Tasks run
//! independently; one slow or failing container only affects its own entry.
//! The response is built once every task has finished, each bounded by the
//! fetch timeout.

pub mod framing;
pub mod source;

use crate::metrics_defs::{LOG_FANOUT_SIZE, LOG_FETCH_DURATION, LOG_FETCHES};
use crate::topology::{Lookup, Topology};
use shared::{counter, histogram};
use source::{FetchError, LogSource};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use url::Url;

/// Prefix of the single log line recorded for a container whose fetch failed.
pub const FAILURE_PREFIX: &str = "Failed to Get Container Logs Because: ";

/// One planned per-container fetch.
#[derive(Clone, Debug)]
pub struct FetchContext {
    pub container_id: String,
    pub target: Url,
    pub timeout: Duration,
}

/// The settled result of one fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub container_id: String,
    pub result: Result<Vec<String>, FetchError>,
}

impl FetchOutcome {
    /// Log lines to store on the container.
    pub fn into_lines(self) -> Vec<String> {
        match self.result {
            Ok(lines) => lines,
            Err(e) => vec![format!("{FAILURE_PREFIX}{e}")],
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FetchSettings {
    pub timeout: Duration,
    /// Extra attempts after a failed fetch
    pub retries: u32,
}

#[derive(Clone, Debug)]
pub struct LogAggregator {
    settings: FetchSettings,
}

impl LogAggregator {
    pub fn new(settings: FetchSettings) -> Self {
        LogAggregator { settings }
    }

    /// Fetches the logs of every eligible container and stores them on the
    /// topology. An empty topology means nothing is deployed.
    pub async fn attach_logs(&self, mut topology: Topology, source: &LogSource) -> Lookup<Topology> {
        if topology.is_empty() {
            return Lookup::NotFound;
        }

        annotate_streams(&mut topology, source);
        let (contexts, mut outcomes) = self.plan(&topology, source);
        histogram!(LOG_FANOUT_SIZE).record(contexts.len() as f64);
        outcomes.extend(self.fetch_all(contexts, source).await);

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        tracing::debug!(
            namespace = %topology.namespace,
            source = source.name(),
            fetched = outcomes.len(),
            failed,
            "Fetched container logs"
        );

        merge(&mut topology, outcomes);
        Lookup::Found(topology)
    }

    /// Splits the topology into fetches to run and containers whose target
    /// could not even be built.
    fn plan(&self, topology: &Topology, source: &LogSource) -> (Vec<FetchContext>, Vec<FetchOutcome>) {
        let mut contexts = Vec::new();
        let mut failed = Vec::new();

        for replica in &topology.replicas {
            for container in &replica.containers {
                match source.target(replica, container) {
                    Some(Ok(target)) => contexts.push(FetchContext {
                        container_id: container.container_id.clone(),
                        target,
                        timeout: self.settings.timeout,
                    }),
                    Some(Err(e)) => failed.push(FetchOutcome {
                        container_id: container.container_id.clone(),
                        result: Err(e),
                    }),
                    None => {}
                }
            }
        }

        (contexts, failed)
    }

    /// Runs all fetches concurrently and waits for every one to settle.
    async fn fetch_all(&self, contexts: Vec<FetchContext>, source: &LogSource) -> Vec<FetchOutcome> {
        let mut join_set = JoinSet::new();
        let mut task_containers = HashMap::new();

        for context in contexts {
            let source = source.clone();
            let retries = self.settings.retries;
            let container_id = context.container_id.clone();

            let abort_handle = join_set.spawn(async move {
                let result = fetch_with_retries(&source, &context, retries).await;
                FetchOutcome {
                    container_id: context.container_id,
                    result,
                }
            });
            task_containers.insert(abort_handle.id(), container_id);
        }

        let mut outcomes = Vec::with_capacity(task_containers.len());
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    task_containers.remove(&id);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Log fetch task failed");
                    if let Some(container_id) = task_containers.remove(&e.id()) {
                        outcomes.push(FetchOutcome {
                            container_id,
                            result: Err(FetchError::Task(e.to_string())),
                        });
                    }
                }
            }
        }
        outcomes
    }
}

async fn fetch_with_retries(
    source: &LogSource,
    context: &FetchContext,
    retries: u32,
) -> Result<Vec<String>, FetchError> {
    let mut attempt = 0;
    loop {
        let started = Instant::now();
        let result = match tokio::time::timeout(context.timeout, source.fetch(context.target.clone())).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(context.timeout)),
        };
        histogram!(LOG_FETCH_DURATION, "source" => source.name())
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(lines) => {
                counter!(LOG_FETCHES, "source" => source.name(), "outcome" => "ok").increment(1);
                return Ok(lines);
            }
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::debug!(
                    container_id = %context.container_id,
                    attempt,
                    error = %e,
                    "Retrying log fetch"
                );
            }
            Err(e) => {
                counter!(LOG_FETCHES, "source" => source.name(), "outcome" => "error").increment(1);
                tracing::warn!(container_id = %context.container_id, error = %e, "Log fetch failed");
                return Err(e);
            }
        }
    }
}

/// Records the streaming URL on every container the source can stream,
/// whether or not its fetch later succeeds.
fn annotate_streams(topology: &mut Topology, source: &LogSource) {
    for container in topology.replicas.iter_mut().flat_map(|r| r.containers.iter_mut()) {
        container.log_stream = source.stream_url(container).map(String::from);
    }
}

/// Stores each outcome on the first container with a matching id whose logs
/// are still unset.
fn merge(topology: &mut Topology, outcomes: Vec<FetchOutcome>) {
    for outcome in outcomes {
        match topology.unset_container_mut(&outcome.container_id) {
            Some(container) => container.logs = Some(outcome.into_lines()),
            None => {
                tracing::warn!(container_id = %outcome.container_id, "No container left for fetched logs");
            }
        }
    }
}
