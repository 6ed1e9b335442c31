pub mod protocol;

use barge::ResolvedEndpoint;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    #[error("invalid cluster endpoint {0}")]
    InvalidEndpoint(String),

    #[error("cluster API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("cluster API responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Client for the cluster API of one resolved barge.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct ClusterApi {
    client: reqwest::Client,
    base: Url,
    auth_token: Option<String>,
}

impl ClusterApi {
    pub fn new(
        client: reqwest::Client,
        endpoint: &ResolvedEndpoint,
        api_prefix: &str,
    ) -> Result<Self, ClusterError> {
        let invalid = || ClusterError::InvalidEndpoint(endpoint.api_endpoint.clone());

        let mut base = Url::parse(&endpoint.api_endpoint).map_err(|_| invalid())?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid());
        }
        base.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(api_prefix.split('/').filter(|s| !s.is_empty()));

        Ok(ClusterApi {
            client,
            base,
            auth_token: endpoint.auth_token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClusterError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClusterError::InvalidEndpoint(self.base.to_string()))?
            .extend(segments);
        Ok(url)
    }

    pub fn pods_url(&self, namespace: &str) -> Result<Url, ClusterError> {
        self.url(&["namespaces", namespace, "pods"])
    }

    pub fn events_url(&self, namespace: &str) -> Result<Url, ClusterError> {
        self.url(&["namespaces", namespace, "events"])
    }

    /// Log sub-resource of one container, with timestamps and a tail limit.
    pub fn pod_log_url(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        tail: u32,
    ) -> Result<Url, ClusterError> {
        let mut url = self.url(&["namespaces", namespace, "pods", pod, "log"])?;
        url.query_pairs_mut()
            .append_pair("container", container)
            .append_pair("timestamps", "true")
            .append_pair("tailLines", &tail.to_string());
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClusterError> {
        let response = self.send(url).await?;
        Ok(response.json().await?)
    }

    pub async fn log(&self, url: Url) -> Result<String, ClusterError> {
        let response = self.send(url).await?;
        Ok(response.text().await?)
    }

    async fn send(&self, url: Url) -> Result<reqwest::Response, ClusterError> {
        tracing::debug!(url = %url, "Calling cluster API");

        let mut request = self.client.get(url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClusterError::Status { status, body });
        }
        Ok(response)
    }
}
