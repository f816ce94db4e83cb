//! Mirror router library: ranks replica mirrors for a client by network
//! and geographic locality.

pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod ranking;
pub mod resilience;

pub use config::RouterConfig;
pub use error::MirrorError;
pub use http::HttpServer;
pub use lifecycle::{AppContext, Shutdown};
pub use ranking::MirrorRouter;
