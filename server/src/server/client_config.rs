//! Public client configuration endpoint.
//!
//! Browser clients fetch their backend settings here instead of baking them
//! into the bundle.

use super::state::AppState;
use axum::{Json, extract::State};
use relay_web::{AppError, WebResult};
use serde::{Deserialize, Serialize};

/// Client settings, all present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigResponse {
    /// Client API key
    pub api_key: String,
    /// Auth domain
    pub auth_domain: String,
    /// Project ID
    pub project_id: String,
    /// Storage bucket
    pub storage_bucket: String,
    /// Messaging sender ID
    pub messaging_sender_id: String,
    /// App ID
    pub app_id: String,
    /// Measurement ID
    pub measurement_id: String,
}

/// Return the client configuration.
///
/// # Endpoint
///
/// ```text
/// GET /api/client-config
/// ```
///
/// # Errors
///
/// `500 CLIENT_CONFIG_INCOMPLETE` if any setting is missing. The response
/// names nothing; the missing settings are logged.
pub async fn client_config(State(state): State<AppState>) -> WebResult<Json<ClientConfigResponse>> {
    let client = &state.config.client;

    let (
        Some(api_key),
        Some(auth_domain),
        Some(project_id),
        Some(storage_bucket),
        Some(messaging_sender_id),
        Some(app_id),
        Some(measurement_id),
    ) = (
        client.api_key.clone(),
        client.auth_domain.clone(),
        client.project_id.clone(),
        client.storage_bucket.clone(),
        client.messaging_sender_id.clone(),
        client.app_id.clone(),
        client.measurement_id.clone(),
    )
    else {
        tracing::warn!(missing = ?client.missing(), "Client configuration incomplete");
        return Err(AppError::internal("Client configuration is incomplete")
            .with_code("CLIENT_CONFIG_INCOMPLETE"));
    };

    tracing::debug!(project_id = %project_id, "Client configuration served");

    Ok(Json(ClientConfigResponse {
        api_key,
        auth_domain,
        project_id,
        storage_bucket,
        messaging_sender_id,
        app_id,
        measurement_id,
    }))
}
