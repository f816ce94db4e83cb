//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Ranking request:
//!     → timeouts.rs (one deadline around resolve + catalog read + rank)
//!     → On expiry: MirrorError::Timeout, inner future dropped
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every request has a deadline
//! - No retries: backing store failures surface to the caller immediately
//! - Timeout errors are distinct from other errors

pub mod timeouts;
