//! Request extractors shared by the relay's handlers.
//!
//! - `CorrelationId`: the request's correlation ID
//! - `ClientIp`: the caller's address, used as the rate-limit key
//!
//! # Examples
//!
//! ```ignore
//! use relay_web::extractors::{ClientIp, CorrelationId};
//!
//! async fn whoami(id: CorrelationId, ClientIp(ip): ClientIp) -> String {
//!     tracing::debug!(correlation_id = %id, client_ip = %ip, "whoami");
//!     format!("{ip} ({id})")
//! }
//! ```

use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, HeaderValue, request::Parts},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Set by [`correlation_id_layer`](crate::middleware::correlation_id_layer).
/// Without the layer, the `X-Correlation-ID` header is used when it holds a
/// UUID, and a new one is generated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// A new random ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The ID carried by the `X-Correlation-ID` header, if it is a UUID.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Self)
    }

    /// Header encoding of the ID.
    #[must_use]
    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0.to_string()).ok()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .copied()
            .or_else(|| Self::from_headers(&parts.headers))
            .unwrap_or_else(Self::generate))
    }
}

/// Client IP address.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Connection address, when the server was started with
///    `into_make_service_with_connect_info::<SocketAddr>()`
/// 4. `127.0.0.1`
///
/// The forwarding headers are only trustworthy behind a proxy that sets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = extract_client_ip(&parts.headers, parts.extensions.get());

        Ok(Self(ip))
    }
}

/// Extract client IP from headers or connection info.
fn extract_client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> IpAddr {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    header_ip("X-Forwarded-For")
        .or_else(|| header_ip("X-Real-IP"))
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn client_ip(req: Request<()>) -> IpAddr {
        let (mut parts, ()) = req.into_parts();
        ClientIp::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    async fn correlation_id(req: Request<()>) -> CorrelationId {
        let (mut parts, ()) = req.into_parts();
        CorrelationId::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_correlation_id_header_fallback() {
        let sent = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, format!(" {sent} "))
            .body(())
            .unwrap();

        assert_eq!(correlation_id(req).await, CorrelationId(sent));
    }

    #[tokio::test]
    async fn test_correlation_id_layer_value_wins() {
        let assigned = CorrelationId::generate();
        let mut req = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap();
        req.extensions_mut().insert(assigned);

        assert_eq!(correlation_id(req).await, assigned);
    }

    #[test]
    fn test_correlation_id_header_roundtrip() {
        let id = CorrelationId::generate();
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_ID_HEADER, id.header_value().unwrap());

        assert_eq!(CorrelationId::from_headers(&headers), Some(id));
    }

    #[tokio::test]
    async fn test_client_ip_takes_first_forwarded_hop() {
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.1, 198.51.100.1")
            .header("X-Real-IP", "198.51.100.42")
            .body(())
            .unwrap();

        assert_eq!(client_ip(req).await.to_string(), "203.0.113.1");
    }

    #[tokio::test]
    async fn test_client_ip_real_ip_header() {
        let req = Request::builder()
            .header("X-Real-IP", "198.51.100.42")
            .body(())
            .unwrap();

        assert_eq!(client_ip(req).await.to_string(), "198.51.100.42");
    }

    #[tokio::test]
    async fn test_client_ip_from_connect_info() {
        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 51_000))));

        assert_eq!(client_ip(req).await.to_string(), "192.0.2.10");
    }

    #[tokio::test]
    async fn test_client_ip_defaults_to_loopback() {
        let req = Request::builder()
            .header("X-Forwarded-For", "garbage")
            .body(())
            .unwrap();

        assert_eq!(client_ip(req).await, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
