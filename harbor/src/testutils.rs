use async_trait::async_trait;
use barge::config::{Config as BargeConfig, StaticEndpoint};
use barge::discovery::{Discovery, DiscoveryError};
use barge::{EndpointResolver, cache::ExpiringCache};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct MockResponse {
    pub status: u16,
    pub body: Bytes,
    pub delay: Duration,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        MockResponse {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Starts an HTTP server on an ephemeral port answering with `handler`.
pub async fn start_mock_server<F>(handler: F) -> u16
where
    F: Fn(&Request<Incoming>) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let handler = handler.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let mock = handler(&req);
                    async move {
                        if !mock.delay.is_zero() {
                            tokio::time::sleep(mock.delay).await;
                        }
                        let response = Response::builder()
                            .status(mock.status)
                            .body(Full::new(mock.body))
                            .unwrap();
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await;
            });
        }
    });

    port
}

/// A pod as listed by the cluster API. Containers are `(id, name)` pairs;
/// an empty id means the container has not started.
pub fn pod(name: &str, host: &str, phase: &str, containers: &[(&str, &str)]) -> Value {
    let statuses: Vec<Value> = containers
        .iter()
        .map(|(id, container)| {
            let state = if id.is_empty() {
                json!({"waiting": {"reason": "ContainerCreating"}})
            } else {
                json!({"running": {"startedAt": "2024-01-01T00:00:00Z"}})
            };
            let mut status = json!({
                "name": container,
                "image": format!("registry.example.com/{container}:1.0"),
                "ready": !id.is_empty(),
                "restartCount": 0,
                "state": state,
            });
            if !id.is_empty() {
                status["containerID"] = json!(format!("docker://{id}"));
            }
            status
        })
        .collect();

    json!({
        "metadata": {"name": name},
        "status": {
            "phase": phase,
            "hostIP": host,
            "podIP": "172.16.0.2",
            "conditions": [{"type": "Ready", "status": "True"}],
            "containerStatuses": statuses,
        }
    })
}

pub fn pod_list(pods: Vec<Value>) -> String {
    json!({"kind": "PodList", "items": pods}).to_string()
}

/// Encodes each line as its own multiplexed stdout frame.
pub fn frames(lines: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        let payload = format!("{line}\n");
        out.extend_from_slice(&[1, 0, 0, 0]);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload.as_bytes());
    }
    out
}

/// Discovery answering from a fixed workload table.
pub struct StaticDiscovery(pub HashMap<String, Vec<String>>);

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(
        &self,
        workload: &str,
        _environment: &str,
        _location: &str,
    ) -> Result<Vec<String>, DiscoveryError> {
        Ok(self.0.get(workload).cloned().unwrap_or_default())
    }
}

/// Resolver with `mss` pinned to `endpoint` and discovery that knows
/// `dynamic` and nothing else.
pub fn resolver(endpoint: &str) -> EndpointResolver {
    let mut config = BargeConfig::default();
    config.static_endpoints.insert(
        "mss".into(),
        StaticEndpoint {
            endpoint: endpoint.into(),
            token: Some("static-token".into()),
        },
    );

    let discovery = StaticDiscovery(HashMap::from([(
        "dynamic-barge-api".to_string(),
        vec![endpoint.to_string()],
    )]));

    EndpointResolver::new(
        &config,
        Some(Arc::new(discovery)),
        ExpiringCache::new(Duration::from_secs(60)),
    )
}
