//! Resolves a barge name to the cluster API endpoint that serves it.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod metrics_defs;
pub mod resolver;
pub mod types;

use cache::{ExpiringCache, SweepHandle};
use discovery::{Discovery, DiscoveryError, InventoryDiscovery};
use std::sync::Arc;
use std::time::Duration;

pub use resolver::{EndpointResolver, ResolveError};
pub use types::ResolvedEndpoint;

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("invalid barge config: {0}")]
    Invalid(#[from] config::ValidationError),
    #[error("failed to set up discovery: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Builds the resolver described by `config` and starts its cache sweep.
///
/// Must be called from within a tokio runtime. Dropping the returned handle
/// stops the sweep.
pub fn from_config(config: &config::Config) -> Result<(EndpointResolver, SweepHandle), SetupError> {
    config.validate()?;

    let discovery = match &config.discovery {
        Some(discovery) => {
            let inventory = InventoryDiscovery::new(
                discovery.url.clone(),
                Duration::from_secs(discovery.timeout_secs),
            )?;
            Some(Arc::new(inventory) as Arc<dyn Discovery>)
        }
        None => None,
    };

    let cache = ExpiringCache::new(Duration::from_secs(config.cache.ttl_secs));
    let sweeper = cache.spawn_sweeper(Duration::from_millis(config.cache.sweep_interval_ms));

    Ok((EndpointResolver::new(config, discovery, cache), sweeper))
}
