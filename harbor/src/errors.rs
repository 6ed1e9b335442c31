use crate::cluster::ClusterError;
use barge::ResolveError;
use thiserror::Error;

/// Errors that abort a gateway request as a whole.
///
/// Per-container log failures never surface here; they are folded into the
/// container's logs instead.
#[derive(Error, Debug)]
pub enum HarborError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Error fetching from cluster API: {0}")]
    UpstreamApi(#[from] ClusterError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarborError {
    /// True when the requested barge does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HarborError::Resolve(e) if e.is_not_found())
    }
}
