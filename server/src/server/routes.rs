//! Router configuration for the relay.
//!
//! Builds the complete Axum router with all endpoints.

use super::client_config::client_config;
use super::health::{health_check, metrics, status};
use super::state::AppState;
use crate::config::LLM_ACTION;
use crate::llm::chat_completions;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use relay_auth::LoginLinkService;
use relay_auth::providers::EmailSender;
use relay_web::middleware::{RouteRateLimit, correlation_id_layer, rate_limit};
use relay_web::login_router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Configures all routes including:
/// - Health, status, and metrics
/// - Client configuration
/// - The rate-limited completion proxy
/// - Login-link endpoints under `/api/auth`
///
/// # Arguments
///
/// - `state`: Application state to share with handlers
/// - `login`: Login-link service behind `/api/auth`
///
/// # Returns
///
/// Configured Axum router ready to serve requests.
pub fn build_router<E>(state: AppState, login: Arc<LoginLinkService<E>>) -> Router
where
    E: EmailSender + 'static,
{
    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    let llm_limit = from_fn_with_state(
        RouteRateLimit::new(state.limiter.clone(), LLM_ACTION),
        rate_limit,
    );

    Router::new()
        .route("/metrics", get(metrics))
        .route("/api/health", get(health_check))
        .route("/api/status", get(status))
        .route("/api/client-config", get(client_config))
        .route(
            "/api/llm/chat/completions",
            post(chat_completions).route_layer(llm_limit),
        )
        .with_state(state)
        .nest("/api/auth", login_router(login))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(correlation_id_layer())
}

/// CORS for the configured browser origins, with credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-correlation-id"),
        ])
        .expose_headers([
            header::RETRY_AFTER,
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-correlation-id"),
        ])
        .allow_credentials(true)
}
