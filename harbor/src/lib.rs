//! Read-only aggregation gateway over deployed shipments.
//!
//! A request names a barge, a shipment and an environment. The barge is
//! resolved to a cluster API endpoint, the deployment's replicas are listed
//! from it and the logs of every container are fetched concurrently and
//! merged into one response.

pub mod cluster;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod logs;
pub mod metrics_defs;
pub mod routing;
pub mod service;
pub mod status;
pub mod topology;

#[cfg(test)]
mod testutils;

use barge::EndpointResolver;
use errors::HarborError;
use service::HarborService;
use shared::http::run_http_service;
use std::sync::Arc;

pub use gateway::Harbor;

pub async fn run(config: config::Config, resolver: Arc<EndpointResolver>) -> Result<(), HarborError> {
    let harbor = Harbor::new(&config, resolver)?;
    let service = HarborService::new(Arc::new(harbor));
    run_http_service(&config.listener.host, config.listener.port, service).await
}
