//! Axum middleware for request tracking and rate limiting.
//!
//! - **Correlation ID tracking**: tag each request and its tracing span with an ID
//! - **Rate limiting**: reject callers that exceed an action's ceiling
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn_with_state, routing::post};
//! use relay_web::middleware::{RouteRateLimit, correlation_id_layer, rate_limit};
//!
//! let app = Router::new()
//!     .route("/api/llm/chat/completions", post(chat))
//!     .route_layer(from_fn_with_state(RouteRateLimit::new(limiter, "llm"), rate_limit))
//!     .layer(correlation_id_layer());
//! ```

use crate::error::AppError;
use crate::extractors::{ClientIp, CorrelationId};
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use relay_auth::{Decision, RateLimiter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

/// Header carrying the request's correlation ID, in both directions.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Header reporting how many requests remain in the caller's window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-RateLimit-Remaining";

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Tag every request with a correlation ID.
///
/// The ID is taken from a valid `X-Correlation-ID` request header or freshly
/// generated, stored as a [`CorrelationId`] extension, recorded on an
/// `http_request` span around the inner service, and echoed on the response.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationLayer {
    CorrelationLayer
}

/// Layer returned by [`correlation_id_layer`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrelationLayer;

impl<S> Layer<S> for CorrelationLayer {
    type Service = Correlated<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Correlated { inner }
    }
}

/// Service produced by [`CorrelationLayer`].
#[derive(Clone, Debug)]
pub struct Correlated<S> {
    inner: S,
}

impl<S> Service<Request> for Correlated<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let id = CorrelationId::from_headers(request.headers()).unwrap_or_else(CorrelationId::generate);
        request.extensions_mut().insert(id);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %id,
            method = %request.method(),
            path = %request.uri().path(),
        );
        let started = Instant::now();
        let pending = self.inner.call(request);

        Box::pin(
            async move {
                let mut response = pending.await?;

                tracing::debug!(
                    status = response.status().as_u16(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Request finished"
                );
                if let Some(value) = id.header_value() {
                    response.headers_mut().insert(CORRELATION_ID_HEADER, value);
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}

/// State for [`rate_limit`]: which limiter and which action a route counts against.
#[derive(Clone, Debug)]
pub struct RouteRateLimit {
    limiter: Arc<RateLimiter>,
    action: &'static str,
}

impl RouteRateLimit {
    /// Count requests to the wrapped routes against `action`.
    #[must_use]
    pub const fn new(limiter: Arc<RateLimiter>, action: &'static str) -> Self {
        Self { limiter, action }
    }
}

/// Rate-limit middleware keyed by client IP.
///
/// Use with `axum::middleware::from_fn_with_state`. Admitted requests carry
/// an `X-RateLimit-Remaining` response header; rejected requests get `429`
/// with `Retry-After` and never reach the handler.
pub async fn rate_limit(
    State(guard): State<RouteRateLimit>,
    ClientIp(ip): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    match guard.limiter.try_admit(guard.action, &ip.to_string()) {
        Decision::Admitted { remaining } => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        Decision::Rejected { retry_after } => {
            AppError::too_many_requests(retry_after).into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get};
    use relay_auth::RateLimitPolicy;
    use relay_core::environment::SystemClock;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn echo_router() -> Router {
        Router::new()
            .route("/echo", get(|id: CorrelationId| async move { id.to_string() }))
            .layer(correlation_id_layer())
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_id_reaches_handler_and_response() {
        let request = Request::builder().uri("/echo").body(Body::empty()).unwrap();
        let response = echo_router().oneshot(request).await.unwrap();

        let echoed = response.headers()[CORRELATION_ID_HEADER].to_str().unwrap().to_string();
        assert!(Uuid::parse_str(&echoed).is_ok());
        assert_eq!(body_text(response).await, echoed);
    }

    #[tokio::test]
    async fn test_incoming_id_is_kept() {
        let incoming = Uuid::new_v4().to_string();
        let request = Request::builder()
            .uri("/echo")
            .header(CORRELATION_ID_HEADER, &incoming)
            .body(Body::empty())
            .unwrap();

        let response = echo_router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[CORRELATION_ID_HEADER], incoming.as_str());
        assert_eq!(body_text(response).await, incoming);
    }

    #[tokio::test]
    async fn test_malformed_id_is_replaced() {
        let request = Request::builder()
            .uri("/echo")
            .header(CORRELATION_ID_HEADER, "not-a-uuid")
            .body(Body::empty())
            .unwrap();

        let response = echo_router().oneshot(request).await.unwrap();
        let echoed = response.headers()[CORRELATION_ID_HEADER].to_str().unwrap();
        assert_ne!(echoed, "not-a-uuid");
        assert!(Uuid::parse_str(echoed).is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_after_ceiling() {
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(SystemClock),
            RateLimitPolicy::new(Duration::from_secs(60), 2),
        ));
        let app = Router::new()
            .route("/limited", get(|| async { "ok" }))
            .route_layer(from_fn_with_state(RouteRateLimit::new(limiter, "test"), rate_limit));

        let call = |ip: &'static str| {
            let app = app.clone();
            async move {
                let request = Request::builder()
                    .uri("/limited")
                    .header("X-Forwarded-For", ip)
                    .body(Body::empty())
                    .unwrap();
                app.oneshot(request).await.unwrap()
            }
        };

        let first = call("203.0.113.5").await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[RATE_LIMIT_REMAINING_HEADER], "1");

        let second = call("203.0.113.5").await;
        assert_eq!(second.headers()[RATE_LIMIT_REMAINING_HEADER], "0");

        let third = call("203.0.113.5").await;
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = third.headers()["Retry-After"].to_str().unwrap().parse().unwrap();
        assert!((1..=60).contains(&retry_after));

        // Another client is unaffected
        assert_eq!(call("203.0.113.6").await.status(), StatusCode::OK);
    }
}
