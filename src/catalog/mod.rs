//! Mirror catalog subsystem.
//!
//! # Data Flow
//! ```text
//! external update job
//!     → store.rs insert_mirror (validate, replace by name)
//!     → SQLite: mirrors, subnets, urls + join tables
//!
//! ranking request
//!     → store.rs list_mirrors (one read transaction)
//!     → models.rs Mirror snapshot (subnets + urls attached)
//! ```
//!
//! # Design Decisions
//! - The ranking path only reads; it never mutates mirror rows
//! - Snapshots are taken inside a single transaction
//! - Subnet CIDR text is validated on insert but re-checked at ranking time,
//!   since rows may be written by other tools

pub mod models;
pub mod store;

use thiserror::Error;

pub use models::{Location, Mirror, MirrorView, NewMirror, Subnet, Url};
pub use store::MirrorCatalog;

/// Errors raised by the mirror catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing SQLite store failed or could not be opened.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Subnet text is not a CIDR block with zero host bits.
    #[error("Invalid subnet {0:?}")]
    InvalidSubnet(String),

    /// Coordinates outside [-90, 90] / [-180, 180].
    #[error("Invalid coordinates for mirror {name:?}: lat={latitude}, lon={longitude}")]
    InvalidCoordinates {
        name: String,
        latitude: f64,
        longitude: f64,
    },

    /// Endpoint is not an absolute URL.
    #[error("Invalid url {endpoint:?} for protocol {protocol:?}")]
    InvalidUrl { protocol: String, endpoint: String },

    /// Required text field is blank.
    #[error("Mirror field {0} must not be empty")]
    MissingField(&'static str),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
