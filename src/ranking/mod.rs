//! Mirror ranking subsystem.
//!
//! # Data Flow
//! ```text
//! client IP text
//!     → router.rs parse (InvalidInput on failure)
//!     → geo::IdentityResolver  ─┐ concurrently,
//!     → catalog::list_mirrors  ─┘ under one deadline
//!     → engine.rs stable sort by tier.rs RankKey
//!     → Vec<Mirror>, best first
//! ```
//!
//! # Design Decisions
//! - Tiers: subnet containment, then same ASN, then geographic distance
//! - Expired mirrors are demoted within their tier, never dropped
//! - Ranking is pure and never cached; only resolver results are
//! - Truncation is the caller's concern

pub mod engine;
pub mod router;
pub mod tier;

pub use engine::{rank, rank_detailed, RankedMirror};
pub use router::MirrorRouter;
pub use tier::Tier;
