//! Response envelope and error mapping.
//!
//! JSON bodies use one envelope:
//! `{"status": "success" | "error", "result": ..., "timestamp": <unix secs>}`.
//! Errors carry `{"message": ...}` as the result.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::catalog::CatalogError;
use crate::error::MirrorError;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub result: T,
    pub timestamp: u64,
}

/// Wrap a successful result.
pub fn success<T: Serialize>(result: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        result,
        timestamp: unix_timestamp(),
    })
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Error returned from handlers.
#[derive(Debug)]
pub struct ApiError(pub MirrorError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            MirrorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MirrorError::Catalog(_) | MirrorError::Resolver(_) => StatusCode::SERVICE_UNAVAILABLE,
            MirrorError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<MirrorError> for ApiError {
    fn from(e: MirrorError) -> Self {
        ApiError(e)
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        ApiError(MirrorError::Catalog(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        let body = Envelope {
            status: "error",
            result: json!({ "message": self.0.to_string() }),
            timestamp: unix_timestamp(),
        };
        (status, Json(body)).into_response()
    }
}
