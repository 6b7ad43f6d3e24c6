//! Request extractors shared by the handlers

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::error::AppError;

fn forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(ToOwned::to_owned)
}

/// Client IP used to deduplicate likes
///
/// First `X-Forwarded-For` entry, falling back to the peer address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_client_ip(&parts.headers) {
            return Ok(ClientIp(ip));
        }

        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientIp(addr.ip().to_string()))
            .ok_or_else(|| AppError::Validation("Could not determine IP address".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(forwarded_client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn blank_forwarded_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static(" , 10.0.0.1"));
        assert_eq!(forwarded_client_ip(&headers), None);
    }
}
