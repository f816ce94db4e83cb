//! Client network identity resolution.
//!
//! # Data Flow
//! ```text
//! client IpAddr
//!     → cache.rs (fresh entry? return it)
//!     → maxmind.rs City database  ─┐  run concurrently on the
//!     → maxmind.rs ASN database   ─┘  blocking thread pool
//!     → resolver.rs ClientIdentity { ip, geo, asn }
//!
//! watcher.rs: database file changed → reload reader → atomic swap
//! ```
//!
//! # Design Decisions
//! - "Address not found" is `Ok(None)`, never an error
//! - Lookups take a parsed `IpAddr`; text validation happens before
//! - Geo and ASN are independent: either may resolve without the other

pub mod cache;
pub mod maxmind;
pub mod resolver;
pub mod table;
pub mod watcher;

use std::fmt::Debug;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::ResolverCache;
pub use maxmind::{MaxMindAsnResolver, MaxMindGeoResolver};
pub use resolver::{ClientIdentity, IdentityResolver};
pub use table::TableResolver;

/// Coarse location of an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub continent: Option<String>,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Errors from the geo/ASN databases.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Database file missing or unreadable.
    #[error("Failed to open {kind} database {path}: {source}")]
    Open {
        kind: &'static str,
        path: String,
        #[source]
        source: maxminddb::MaxMindDBError,
    },

    /// Database present but the lookup itself failed.
    #[error("{kind} lookup failed: {source}")]
    Lookup {
        kind: &'static str,
        #[source]
        source: maxminddb::MaxMindDBError,
    },

    /// Blocking lookup task panicked or was cancelled.
    #[error("Resolver task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Resolver cannot serve requests.
    #[error("Resolver unavailable: {0}")]
    Unavailable(String),
}

/// Maps an address to a coarse location.
pub trait GeoLookup: Send + Sync + Debug {
    /// `Ok(None)` when the address is not covered by the database.
    fn resolve_geo(&self, ip: IpAddr) -> Result<Option<GeoLocation>, ResolveError>;
}

/// Maps an address to its autonomous system number.
pub trait AsnLookup: Send + Sync + Debug {
    /// `Ok(None)` when the address is not covered by the database.
    fn resolve_asn(&self, ip: IpAddr) -> Result<Option<u32>, ResolveError>;
}
