//! Request-side helpers: request IDs and client address extraction.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderName, HeaderValue, Request},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use super::response::ApiError;
use crate::error::MirrorError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Generates a UUID v4 request ID for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Address text of the requesting client.
///
/// The first entry of `X-Forwarded-For` when present and non-blank,
/// otherwise the socket peer. Text is validated later by the router.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get(&X_FORWARDED_FOR) {
            let text = value
                .to_str()
                .map_err(|_| MirrorError::InvalidInput("non-ASCII X-Forwarded-For".to_string()))?;
            let first = first_forwarded(text);
            // A blank header carries no client, so the peer address stands.
            if !first.is_empty() {
                return Ok(ClientIp(first.to_string()));
            }
        }

        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientIp(addr.ip().to_string()))
            .ok_or_else(|| ApiError(MirrorError::InvalidInput("client address unavailable".to_string())))
    }
}

fn first_forwarded(header: &str) -> &str {
    header.split(',').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_forwarded() {
        assert_eq!(first_forwarded("10.1.2.3"), "10.1.2.3");
        assert_eq!(first_forwarded(" 10.1.2.3 , 172.16.0.1"), "10.1.2.3");
        assert_eq!(first_forwarded(""), "");
    }

    #[tokio::test]
    async fn test_header_wins_over_peer() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        let (mut parts, _) = request.into_parts();

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, "198.51.100.4");
    }

    #[tokio::test]
    async fn test_falls_back_to_peer() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 4000))));
        let (mut parts, _) = request.into_parts();

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, "192.0.2.9");
    }

    #[tokio::test]
    async fn test_blank_header_falls_back_to_peer() {
        for header in ["", "  ", " , 10.0.0.1"] {
            let mut request = Request::builder()
                .header("x-forwarded-for", header)
                .body(())
                .unwrap();
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 4000))));
            let (mut parts, _) = request.into_parts();

            let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
            assert_eq!(ip, "192.0.2.9", "header {header:?}");
        }
    }

    #[tokio::test]
    async fn test_no_address_is_rejected() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = ClientIp::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err.0, MirrorError::InvalidInput(_)));
    }
}
