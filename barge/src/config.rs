use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("cache ttl cannot be 0")]
    InvalidCacheTtl,

    #[error("cache sweep interval cannot be 0")]
    InvalidSweepInterval,

    #[error("location tag cannot be empty")]
    EmptyLocation,

    #[error("static endpoint for barge {0} is empty")]
    EmptyStaticEndpoint(String),

    #[error("no static endpoints, discovery service or fallback endpoint configured")]
    NoEndpointSource,
}

/// Endpoint and token pair for a barge whose cluster API is known up front.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct StaticEndpoint {
    pub endpoint: String,
    pub token: Option<String>,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct DiscoveryConfig {
    /// Base URL of the instance inventory service
    pub url: Url,
    #[serde(default = "default_discovery_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Deployment location tag passed to discovery
    #[serde(default = "default_location")]
    pub location: String,
    /// Environment the barge APIs themselves are discovered in
    #[serde(default = "default_discovery_environment")]
    pub discovery_environment: String,
    /// Appended to the barge name to form the discovered workload name
    #[serde(default = "default_workload_suffix")]
    pub workload_suffix: String,
    #[serde(default)]
    pub cache: CacheConfig,
    pub discovery: Option<DiscoveryConfig>,
    /// Cluster API used when no discovery service is configured
    pub fallback_endpoint: Option<String>,
    /// Token used for every discovered or fallback endpoint
    pub auth_token: Option<String>,
    /// Keyed by barge name; keys are normalized before use
    #[serde(default)]
    pub static_endpoints: HashMap<String, StaticEndpoint>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            location: default_location(),
            discovery_environment: default_discovery_environment(),
            workload_suffix: default_workload_suffix(),
            cache: CacheConfig::default(),
            discovery: None,
            fallback_endpoint: None,
            auth_token: None,
            static_endpoints: HashMap::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cache.ttl_secs == 0 {
            return Err(ValidationError::InvalidCacheTtl);
        }
        if self.cache.sweep_interval_ms == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        if self.location.is_empty() {
            return Err(ValidationError::EmptyLocation);
        }
        for (barge, endpoint) in &self.static_endpoints {
            if endpoint.endpoint.is_empty() {
                return Err(ValidationError::EmptyStaticEndpoint(barge.clone()));
            }
        }
        if self.static_endpoints.is_empty()
            && self.discovery.is_none()
            && self.fallback_endpoint.is_none()
        {
            return Err(ValidationError::NoEndpointSource);
        }
        Ok(())
    }

    /// Overlays process environment variables on top of the file config.
    ///
    /// `<BARGE>_ENDPOINT` (with an optional `<BARGE>_TOKEN`) adds a static
    /// endpoint, `AUTH_TOKEN` sets the global token and `LOCATION` the
    /// location tag. Endpoint variables whose value is not an http(s) URL are
    /// ignored.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();

        for (name, value) in &vars {
            let Some(barge) = name.strip_suffix("_ENDPOINT") else {
                continue;
            };
            if barge.is_empty() || !is_http_url(value) {
                continue;
            }

            let token = vars.get(&format!("{barge}_TOKEN")).cloned();
            tracing::debug!(barge, "Static endpoint from environment");
            self.static_endpoints.insert(
                barge.to_string(),
                StaticEndpoint {
                    endpoint: value.clone(),
                    token,
                },
            );
        }

        if let Some(token) = vars.get("AUTH_TOKEN") {
            self.auth_token = Some(token.clone());
        }
        if let Some(location) = vars.get("LOCATION").filter(|l| !l.is_empty()) {
            self.location = location.clone();
        }
    }
}

/// `my-barge` and `MY_BARGE` address the same static endpoint.
pub fn normalize_barge_id(barge: &str) -> String {
    barge.replace('-', "_").to_uppercase()
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

fn default_location() -> String {
    "ec2".into()
}

fn default_discovery_environment() -> String {
    "prod".into()
}

fn default_workload_suffix() -> String {
    "-barge-api".into()
}

fn default_discovery_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_ms() -> u64 {
    1000
}
