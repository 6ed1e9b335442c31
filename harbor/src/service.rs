use crate::errors::HarborError;
use crate::gateway::Harbor;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS};
use crate::routing::{Endpoint, Routes};
use crate::topology::{DeploymentKey, Lookup, ReplicaDescriptor};
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use shared::http::{ResponseBody, json_response, make_error_response, make_json_error_response};
use shared::{counter, histogram};
use std::borrow::Cow;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

const NOT_FOUND_MESSAGE: &str = "Could not find Product";

#[derive(Serialize)]
struct HealthBody {
    version: &'static str,
}

#[derive(Serialize)]
struct HarborBody<'a> {
    error: bool,
    replicas: &'a [ReplicaDescriptor],
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<&'static str>,
}

/// HTTP front of the gateway.
#[derive(Clone)]
pub struct HarborService {
    harbor: Arc<Harbor>,
    routes: Arc<Routes>,
}

impl HarborService {
    pub fn new(harbor: Arc<Harbor>) -> Self {
        HarborService {
            harbor,
            routes: Arc::new(Routes::default()),
        }
    }

    pub async fn handle<B>(&self, request: &Request<B>) -> Response<ResponseBody> {
        let path = request.uri().path();
        let Some(matched) = self.routes.resolve(path) else {
            tracing::warn!(method = %request.method(), path, "No route matched");
            return make_error_response(StatusCode::NOT_FOUND);
        };
        if request.method() != Method::GET {
            return make_error_response(StatusCode::METHOD_NOT_ALLOWED);
        }

        let endpoint = matched.endpoint;
        tracing::debug!(endpoint = endpoint.as_str(), path, "Matched route");

        let started = Instant::now();
        let response = match (endpoint, deployment_key(&matched.params)) {
            (Endpoint::HealthCheck, _) => json_response(
                StatusCode::OK,
                &HealthBody {
                    version: env!("CARGO_PKG_VERSION"),
                },
            ),
            (_, None) => make_error_response(StatusCode::NOT_FOUND),
            (Endpoint::Harbor, Some(key)) => match self.harbor.harbor(&key).await {
                Ok(Lookup::Found(topology)) => json_response(
                    StatusCode::OK,
                    &HarborBody {
                        error: false,
                        replicas: &topology.replicas,
                        msg: None,
                    },
                ),
                Ok(Lookup::NotFound) => {
                    tracing::debug!(namespace = %key.namespace(), "No replicas deployed");
                    json_response(
                        StatusCode::OK,
                        &HarborBody {
                            error: false,
                            replicas: &[],
                            msg: Some(NOT_FOUND_MESSAGE),
                        },
                    )
                }
                Err(e) => error_response(&key, e),
            },
            (Endpoint::ShipmentStatus, Some(key)) => match self.harbor.shipment_status(&key).await {
                Ok(status) => json_response(StatusCode::OK, &status),
                Err(e) => error_response(&key, e),
            },
            (Endpoint::ShipmentEvents, Some(key)) => match self.harbor.shipment_events(&key).await {
                Ok(events) => json_response(StatusCode::OK, &events),
                Err(e) => error_response(&key, e),
            },
        };

        counter!(
            REQUESTS,
            "endpoint" => endpoint.as_str(),
            "status" => response.status().as_u16().to_string()
        )
        .increment(1);
        histogram!(REQUEST_DURATION, "endpoint" => endpoint.as_str())
            .record(started.elapsed().as_secs_f64());

        response
    }
}

fn deployment_key(params: &HashMap<String, Cow<'_, str>>) -> Option<DeploymentKey> {
    Some(DeploymentKey::new(
        &**params.get("barge")?,
        &**params.get("shipment")?,
        &**params.get("environment")?,
    ))
}

fn error_response(key: &DeploymentKey, error: HarborError) -> Response<ResponseBody> {
    if error.is_not_found() {
        tracing::warn!(barge = %key.barge_id, error = %error, "Barge not found");
    } else {
        tracing::error!(
            barge = %key.barge_id,
            namespace = %key.namespace(),
            error = %error,
            "Request failed"
        );
    }
    make_json_error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string())
}

impl Service<Request<Incoming>> for HarborService {
    type Response = Response<ResponseBody>;
    type Error = HarborError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        // Every route is a GET; the body is never read
        let (parts, _body) = request.into_parts();
        let request = Request::from_parts(parts, ());
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(&request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LogSourceKind};
    use crate::testutils::{MockResponse, frames, pod, pod_list, resolver, start_mock_server};
    use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn service() -> HarborService {
        let cluster_port = start_mock_server(|req| match req.uri().path() {
            "/api/v1/namespaces/hello-world-app-dev/pods" => MockResponse::new(
                200,
                pod_list(vec![pod(
                    "hello-world-app-1",
                    "127.0.0.1",
                    "Running",
                    &[("a1b2c3", "web"), ("d4e5f6", "sidecar")],
                )]),
            ),
            "/api/v1/namespaces/hello-world-app-dev/events" => MockResponse::new(
                200,
                r#"{"items": [{"type": "Normal", "reason": "Pulled", "count": 1}]}"#,
            ),
            path if path.ends_with("/pods") => MockResponse::new(200, pod_list(vec![])),
            _ => MockResponse::new(404, "not found"),
        })
        .await;
        let log_port =
            start_mock_server(|_| MockResponse::new(200, frames(&["line 1", "line 2", "line 3"])))
                .await;

        let mut config = Config::default();
        config.logs.source = LogSourceKind::Host;
        config.logs.container_api_port = log_port;

        let resolver = resolver(&format!("http://127.0.0.1:{cluster_port}"));
        let harbor = Harbor::new(&config, Arc::new(resolver)).unwrap();
        HarborService::new(Arc::new(harbor))
    }

    async fn get(service: &HarborService, path: &str) -> (StatusCode, Value) {
        let request = Request::get(path).body(()).unwrap();
        let response = service.handle(&request).await;
        let status = response.status();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_check() {
        let service = service().await;
        let (status, body) = get(&service, "/_hc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_harbor() {
        let service = service().await;
        let (status, body) = get(&service, "/harbor/mss/hello-world-app/dev").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], false);
        assert!(body.get("msg").is_none());

        let replicas = body["replicas"].as_array().unwrap();
        assert_eq!(replicas.len(), 1);
        assert_eq!(replicas[0]["name"], "hello-world-app-1");
        let containers = replicas[0]["containers"].as_array().unwrap();
        assert_eq!(containers.len(), 2);
        for container in containers {
            assert_eq!(container["logs"].as_array().unwrap().len(), 3);
            let stream = container["log_stream"].as_str().unwrap();
            assert!(stream.ends_with("&follow=1"), "{stream}");
        }
    }

    #[tokio::test]
    async fn test_harbor_encoded_path() {
        let service = service().await;
        let (status, body) = get(&service, "/harbor/mss/hello%2Dworld%2Dapp/dev").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["replicas"][0]["name"], "hello-world-app-1");
    }

    #[tokio::test]
    async fn test_harbor_not_found() {
        let service = service().await;
        let (status, body) = get(&service, "/harbor/mss/missing-shipment/dev").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], false);
        assert_eq!(body["replicas"], serde_json::json!([]));
        assert_eq!(body["msg"], "Could not find Product");
    }

    #[tokio::test]
    async fn test_missing_barge_is_an_error() {
        let service = service().await;
        let (status, body) = get(&service, "/harbor/missing/hello-world-app/dev").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], true);
        assert_eq!(
            body["message"],
            "No barges returned for missing-barge-api prod ec2"
        );
    }

    #[tokio::test]
    async fn test_status_and_events() {
        let service = service().await;

        let (status, body) = get(&service, "/shipment/status/mss/hello-world-app/dev").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["namespace"], "hello-world-app-dev");
        assert_eq!(body["status"]["phase"], "Running");
        assert_eq!(body["status"]["containers"][0]["id"], "a1b2c3");

        let (status, body) = get(&service, "/shipment/events/mss/hello-world-app/dev").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"][0]["reason"], "Pulled");
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let service = service().await;
        let (status, body) = get(&service, "/containers/mss").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], true);

        let request = Request::post("/_hc").body(()).unwrap();
        let response = service.handle(&request).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
