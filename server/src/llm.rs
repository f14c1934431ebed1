//! Chat-completion proxy.
//!
//! Forwards request bodies unchanged to an OpenAI-compatible API, adding the
//! server-held bearer key, and relays the upstream status and body.

use crate::config::LlmConfig;
use crate::server::AppState;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use relay_web::{AppError, WebResult};
use tracing::{info, warn};

/// Client for the upstream completion API.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LlmClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed (TLS backend
    /// initialisation).
    pub fn new(config: &LlmConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    /// Upstream URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether requests can be forwarded.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Forward `body` upstream and convert the reply into a response.
    ///
    /// # Errors
    ///
    /// - `500 LLM_NOT_CONFIGURED` without an API key
    /// - `504` if the upstream does not answer in time
    /// - `502` for any other transport failure
    pub async fn forward(&self, body: &serde_json::Value) -> WebResult<Response> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("LLM request rejected: no API key configured");
            return Err(
                AppError::internal("The completion API key is not configured")
                    .with_code("LLM_NOT_CONFIGURED"),
            );
        };

        info!(
            model = body.get("model").and_then(serde_json::Value::as_str).unwrap_or("<unset>"),
            messages = body
                .get("messages")
                .and_then(serde_json::Value::as_array)
                .map_or(0, Vec::len),
            "Forwarding completion request"
        );

        let upstream = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = upstream
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let bytes = upstream.bytes().await.map_err(transport_error)?;

        if status.is_success() {
            metrics::counter!("relay_llm_requests_total", "outcome" => "success").increment(1);
            info!(status = %status, "Completion request succeeded");
        } else {
            metrics::counter!("relay_llm_requests_total", "outcome" => "upstream_error").increment(1);
            warn!(status = %status, "Completion API returned an error");
        }

        Ok((status, [(header::CONTENT_TYPE, content_type)], bytes).into_response())
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("endpoint", &self.endpoint)
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        metrics::counter!("relay_llm_requests_total", "outcome" => "timeout").increment(1);
        AppError::gateway_timeout("The completion API did not respond in time")
            .with_source(err.into())
    } else {
        metrics::counter!("relay_llm_requests_total", "outcome" => "unreachable").increment(1);
        AppError::bad_gateway("The completion API could not be reached").with_source(err.into())
    }
}

/// Proxy a chat-completion request.
///
/// # Endpoint
///
/// ```text
/// POST /api/llm/chat/completions
/// Content-Type: application/json
///
/// { "model": "llama-3.1-8b-instant", "messages": [ ... ] }
/// ```
///
/// The upstream status and body are returned as-is. Requests are counted
/// against the `llm` rate limit per client.
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> WebResult<Response> {
    state.llm.forward(&body).await
}
