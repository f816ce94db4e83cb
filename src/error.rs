//! Top-level error type for ranking requests.

use std::time::Duration;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::geo::ResolveError;

/// Failure of a ranking request, as seen by callers.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Client address text is not an IP address.
    #[error("Invalid client address {0:?}")]
    InvalidInput(String),

    /// Mirror catalog could not be read.
    #[error("Mirror catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),

    /// Geo or ASN database could not be queried.
    #[error("Address resolver unavailable: {0}")]
    Resolver(#[from] ResolveError),

    /// Request did not finish before its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl MirrorError {
    /// Short label for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            MirrorError::InvalidInput(_) => "invalid_input",
            MirrorError::Catalog(_) | MirrorError::Resolver(_) => "unavailable",
            MirrorError::Timeout(_) => "timeout",
        }
    }
}
