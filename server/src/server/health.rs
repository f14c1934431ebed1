//! Health, status, and metrics endpoints for the relay.

use super::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Deployment environment
    pub environment: String,
    /// Service version
    pub version: String,
    /// Server time (RFC 3339)
    pub timestamp: String,
}

/// Health check endpoint.
///
/// Returns 200 OK if the service is running.
/// This is a simple liveness check - it doesn't call the completion API.
///
/// # Example
///
/// ```bash
/// curl http://localhost:5000/api/health
/// # {"status":"ok","environment":"development","version":"0.1.0","timestamp":"..."}
/// ```
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            environment: state.config.server.environment.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: state.clock.now().to_rfc3339(),
        }),
    )
}

/// Diagnostic status response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Human-readable summary
    pub message: String,
    /// Whether the completion API key is set
    pub llm_key_configured: bool,
    /// Deployment environment
    pub environment: String,
    /// Listening port
    pub port: u16,
    /// Login tokens not yet redeemed or swept
    pub tokens_in_flight: usize,
    /// Rate-limit windows not yet swept
    pub rate_windows: usize,
}

/// Diagnostic status endpoint.
///
/// Reports configuration presence (never values) and store sizes.
///
/// # Example
///
/// ```bash
/// curl http://localhost:5000/api/status
/// # {"message":"Server is running","llmKeyConfigured":true,"environment":"development",
/// #  "port":5000,"tokensInFlight":3,"rateWindows":12}
/// ```
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Server is running".to_string(),
        llm_key_configured: state.llm.is_configured(),
        environment: state.config.server.environment.clone(),
        port: state.config.server.port,
        tokens_in_flight: state.tokens.len(),
        rate_windows: state.limiter.len(),
    })
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
