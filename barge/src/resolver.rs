use crate::cache::ExpiringCache;
use crate::config::{Config, StaticEndpoint, normalize_barge_id};
use crate::discovery::{Discovery, DiscoveryError};
use crate::metrics_defs::{
    DISCOVERY_CACHE_HIT, DISCOVERY_CACHE_MISS, DISCOVERY_DURATION, STATIC_ENDPOINT_HIT,
};
use crate::types::ResolvedEndpoint;
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("No barges returned for {workload} {environment} {location}")]
    DiscoveryEmpty {
        workload: String,
        environment: String,
        location: String,
    },

    #[error("discovery failed for {workload}: {source}")]
    DiscoveryFailed {
        workload: String,
        #[source]
        source: DiscoveryError,
    },

    #[error("no endpoint configured for barge {0}")]
    Unconfigured(String),
}

impl ResolveError {
    /// Whether the barge simply does not exist, as opposed to a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ResolveError::DiscoveryEmpty { .. } | ResolveError::Unconfigured(_)
        )
    }
}

/// Decides how to reach the cluster API of a barge.
///
/// Resolution order:
/// 1. static configuration for the normalized barge id
/// 2. the discovery cache, then the discovery service on a miss
/// 3. the global fallback endpoint when no discovery service is configured
///
/// Concurrent misses for the same barge each call discovery; the results
/// written to the cache are equivalent.
pub struct EndpointResolver {
    static_endpoints: HashMap<String, StaticEndpoint>,
    discovery: Option<Arc<dyn Discovery>>,
    cache: ExpiringCache<Vec<String>>,
    auth_token: Option<String>,
    fallback_endpoint: Option<String>,
    location: String,
    environment: String,
    workload_suffix: String,
}

impl EndpointResolver {
    pub fn new(
        config: &Config,
        discovery: Option<Arc<dyn Discovery>>,
        cache: ExpiringCache<Vec<String>>,
    ) -> Self {
        let static_endpoints = config
            .static_endpoints
            .iter()
            .map(|(barge, endpoint)| (normalize_barge_id(barge), endpoint.clone()))
            .collect();

        EndpointResolver {
            static_endpoints,
            discovery,
            cache,
            auth_token: config.auth_token.clone(),
            fallback_endpoint: config.fallback_endpoint.clone(),
            location: config.location.clone(),
            environment: config.discovery_environment.clone(),
            workload_suffix: config.workload_suffix.clone(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub async fn resolve(&self, barge_id: &str) -> Result<ResolvedEndpoint, ResolveError> {
        if let Some(endpoint) = self.static_endpoints.get(&normalize_barge_id(barge_id)) {
            tracing::debug!(barge = barge_id, endpoint = %endpoint.endpoint, "Found static endpoint");
            counter!(STATIC_ENDPOINT_HIT).increment(1);
            return Ok(ResolvedEndpoint::new(
                barge_id,
                endpoint.endpoint.clone(),
                endpoint.token.clone(),
                false,
            ));
        }

        let Some(discovery) = &self.discovery else {
            return match &self.fallback_endpoint {
                Some(fallback) => {
                    tracing::debug!(barge = barge_id, endpoint = %fallback, "Using fallback endpoint");
                    Ok(ResolvedEndpoint::new(
                        barge_id,
                        fallback.clone(),
                        self.auth_token.clone(),
                        false,
                    ))
                }
                None => Err(ResolveError::Unconfigured(barge_id.to_string())),
            };
        };

        let workload = format!("{barge_id}{}", self.workload_suffix);
        let key = format!("{workload}-{}-{}", self.environment, self.location);

        if let Some(first) = self.cache.get(&key).and_then(|cached| cached.into_iter().next()) {
            tracing::debug!(key = %key, endpoint = %first, "Discovery cache hit");
            counter!(DISCOVERY_CACHE_HIT).increment(1);
            return Ok(self.discovered(barge_id, first));
        }
        counter!(DISCOVERY_CACHE_MISS).increment(1);

        tracing::debug!(workload = %workload, environment = %self.environment, location = %self.location, "Discovering barge");
        let started = Instant::now();
        let result = discovery
            .discover(&workload, &self.environment, &self.location)
            .await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        histogram!(DISCOVERY_DURATION, "outcome" => outcome).record(started.elapsed().as_secs_f64());

        let endpoints = result.map_err(|source| {
            tracing::warn!(workload = %workload, error = %source, "Discovery errored");
            ResolveError::DiscoveryFailed {
                workload: workload.clone(),
                source,
            }
        })?;

        let Some(first) = endpoints.first().cloned() else {
            return Err(ResolveError::DiscoveryEmpty {
                workload,
                environment: self.environment.clone(),
                location: self.location.clone(),
            });
        };

        tracing::debug!(workload = %workload, ?endpoints, "Discovery returned");
        self.cache.set(key, endpoints);
        Ok(self.discovered(barge_id, first))
    }

    fn discovered(&self, barge_id: &str, endpoint: String) -> ResolvedEndpoint {
        ResolvedEndpoint::new(barge_id, endpoint, self.auth_token.clone(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Discovery double returning a fixed answer and counting calls.
    struct MockDiscovery {
        answer: Mutex<Result<Vec<String>, String>>,
        calls: AtomicUsize,
        last_args: Mutex<Option<(String, String, String)>>,
    }

    impl MockDiscovery {
        fn returning(endpoints: &[&str]) -> Arc<Self> {
            Arc::new(MockDiscovery {
                answer: Mutex::new(Ok(endpoints.iter().map(|e| e.to_string()).collect())),
                calls: AtomicUsize::new(0),
                last_args: Mutex::new(None),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(MockDiscovery {
                answer: Mutex::new(Err(reason.to_string())),
                calls: AtomicUsize::new(0),
                last_args: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Discovery for MockDiscovery {
        async fn discover(
            &self,
            workload: &str,
            environment: &str,
            location: &str,
        ) -> Result<Vec<String>, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_args.lock() = Some((
                workload.to_string(),
                environment.to_string(),
                location.to_string(),
            ));
            self.answer.lock().clone().map_err(DiscoveryError::Other)
        }
    }

    fn test_config() -> Config {
        Config {
            auth_token: Some("global-token".into()),
            ..Config::default()
        }
    }

    fn test_resolver(
        config: &Config,
        discovery: Arc<MockDiscovery>,
    ) -> (Arc<ManualClock>, EndpointResolver) {
        let clock = Arc::new(ManualClock::new());
        let cache = ExpiringCache::with_clock(Duration::from_secs(300), clock.clone());
        (clock, EndpointResolver::new(config, Some(discovery), cache))
    }

    #[tokio::test]
    async fn test_static_endpoint_skips_discovery() {
        let mut config = test_config();
        config.static_endpoints.insert(
            "mss".into(),
            StaticEndpoint {
                endpoint: "https://10.0.0.1:6443".into(),
                token: Some("mss-token".into()),
            },
        );
        let discovery = MockDiscovery::returning(&["http://101.0.0.1:5000"]);
        let (_clock, resolver) = test_resolver(&config, discovery.clone());

        let endpoint = resolver.resolve("mss").await.unwrap();
        assert_eq!(
            endpoint,
            ResolvedEndpoint::new("mss", "https://10.0.0.1:6443", Some("mss-token".into()), false)
        );
        assert_eq!(discovery.calls(), 0);
    }

    #[tokio::test]
    async fn test_static_endpoint_normalized_key() {
        let mut config = test_config();
        config.static_endpoints.insert(
            "MY_BARGE".into(),
            StaticEndpoint {
                endpoint: "https://10.0.0.2".into(),
                token: None,
            },
        );
        let discovery = MockDiscovery::returning(&[]);
        let (_clock, resolver) = test_resolver(&config, discovery.clone());

        let endpoint = resolver.resolve("my-barge").await.unwrap();
        assert_eq!(endpoint.api_endpoint, "https://10.0.0.2");
        assert!(!endpoint.is_dynamically_managed);
        assert_eq!(discovery.calls(), 0);
    }

    #[tokio::test]
    async fn test_discovery_then_cache_hit() {
        let config = test_config();
        let discovery = MockDiscovery::returning(&["http://101.0.0.1:5000", "http://101.0.0.2:5000"]);
        let (_clock, resolver) = test_resolver(&config, discovery.clone());

        let first = resolver.resolve("mss").await.unwrap();
        assert_eq!(
            first,
            ResolvedEndpoint::new("mss", "http://101.0.0.1:5000", Some("global-token".into()), true)
        );
        assert_eq!(discovery.calls(), 1);
        assert_eq!(
            discovery.last_args.lock().clone(),
            Some(("mss-barge-api".into(), "prod".into(), "ec2".into()))
        );

        let second = resolver.resolve("mss").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_expiry_rediscovers() {
        let config = test_config();
        let discovery = MockDiscovery::returning(&["http://101.0.0.1:5000"]);
        let (clock, resolver) = test_resolver(&config, discovery.clone());

        resolver.resolve("mss").await.unwrap();
        clock.advance(Duration::from_secs(300));
        resolver.resolve("mss").await.unwrap();

        assert_eq!(discovery.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_discovery() {
        let config = test_config();
        let discovery = MockDiscovery::returning(&[]);
        let (_clock, resolver) = test_resolver(&config, discovery.clone());

        let err = resolver.resolve("missing").await.unwrap_err();
        assert!(matches!(err, ResolveError::DiscoveryEmpty { .. }));
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "No barges returned for missing-barge-api prod ec2"
        );

        // Empty results are not cached
        resolver.resolve("missing").await.unwrap_err();
        assert_eq!(discovery.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_discovery_not_cached() {
        let config = test_config();
        let discovery = MockDiscovery::failing("inventory unavailable");
        let (_clock, resolver) = test_resolver(&config, discovery.clone());

        let err = resolver.resolve("mss").await.unwrap_err();
        match &err {
            ResolveError::DiscoveryFailed { workload, source } => {
                assert_eq!(workload, "mss-barge-api");
                assert_eq!(source.to_string(), "inventory unavailable");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!err.is_not_found());

        // A later success is used right away
        *discovery.answer.lock() = Ok(vec!["http://101.0.0.1:5000".into()]);
        let endpoint = resolver.resolve("mss").await.unwrap();
        assert_eq!(endpoint.api_endpoint, "http://101.0.0.1:5000");
        assert_eq!(discovery.calls(), 2);
    }

    #[tokio::test]
    async fn test_location_in_cache_key() {
        let mut config = test_config();
        config.location = "gcp".into();
        let discovery = MockDiscovery::returning(&["http://101.0.0.1:5000"]);
        let clock = Arc::new(ManualClock::new());
        let cache = ExpiringCache::with_clock(Duration::from_secs(300), clock);
        let resolver = EndpointResolver::new(&config, Some(discovery.clone()), cache.clone());

        resolver.resolve("mss").await.unwrap();
        assert!(cache.get("mss-barge-api-prod-gcp").is_some());
        assert_eq!(resolver.location(), "gcp");
    }

    #[tokio::test]
    async fn test_fallback_without_discovery() {
        let mut config = test_config();
        config.fallback_endpoint = Some("https://cluster.example.net".into());
        let cache = ExpiringCache::new(Duration::from_secs(300));
        let resolver = EndpointResolver::new(&config, None, cache);

        let endpoint = resolver.resolve("anything").await.unwrap();
        assert_eq!(
            endpoint,
            ResolvedEndpoint::new(
                "anything",
                "https://cluster.example.net",
                Some("global-token".into()),
                false
            )
        );
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let config = test_config();
        let cache = ExpiringCache::new(Duration::from_secs(300));
        let resolver = EndpointResolver::new(&config, None, cache);

        let err = resolver.resolve("mss").await.unwrap_err();
        assert!(matches!(err, ResolveError::Unconfigured(_)));
    }
}
