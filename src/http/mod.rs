//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (client address from X-Forwarded-For or peer)
//!     → handlers.rs (rank, project, truncate)
//!     → response.rs (success/error envelope)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{ClientIp, X_REQUEST_ID};
pub use server::{build_router, HttpServer};
