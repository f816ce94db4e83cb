//! HTTP server setup and configuration.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{body::Body, http::Request, routing::get, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::handlers;
use super::request::{UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::{AppContext, Shutdown};

/// HTTP front end of the mirror router.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(context: AppContext) -> Self {
        Self {
            router: build_router(context),
        }
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(context: AppContext) -> Router {
    // One second past the ranking deadline so the router's own 504 wins.
    let http_timeout = Duration::from_secs(context.config.timeouts.request_secs + 1);

    Router::new()
        .route("/mirrors", get(handlers::ranked_mirrors))
        .route("/mirrors/all", get(handlers::all_mirrors))
        .route("/mirrorlist", get(handlers::mirrorlist))
        .route(
            "/mirrorlist/{version}/{repository}",
            get(handlers::repository_mirrorlist),
        )
        .route("/url-types", get(handlers::url_types))
        .route("/status", get(handlers::get_status))
        .with_state(context)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(&X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(TimeoutLayer::new(http_timeout)),
        )
}
