//! Login-link handlers.
//!
//! Implements passwordless sign-in via emailed single-use links.

use crate::WebResult;
use crate::extractors::{ClientIp, CorrelationId};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use relay_auth::providers::EmailSender;
use relay_auth::{LoginLinkRequest, LoginLinkService, VerifiedLogin};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response after sending a login link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginLinkResponse {
    /// Confirmation message.
    pub message: String,

    /// Email address the link was sent to.
    pub identity: String,
}

/// Request to redeem a login token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifyRequest {
    /// Token from the login link.
    pub token: String,
}

/// Send a login link to the caller's email.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/login-link
/// Content-Type: application/json
///
/// {
///   "identity": "user@example.com",
///   "displayName": "Ada",
///   "context": "store-42"
/// }
/// ```
///
/// # Response
///
/// `202 Accepted`
///
/// ```json
/// {
///   "message": "Login link sent. Check your email.",
///   "identity": "user@example.com"
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: identity is not an email address
/// - `429 Too Many Requests`: too many links for this client and identity
/// - `502 Bad Gateway`: the email could not be sent
pub async fn request_login_link<E>(
    State(service): State<Arc<LoginLinkService<E>>>,
    correlation_id: CorrelationId,
    ClientIp(ip): ClientIp,
    Json(request): Json<LoginLinkRequest>,
) -> WebResult<(StatusCode, Json<LoginLinkResponse>)>
where
    E: EmailSender + 'static,
{
    tracing::debug!(correlation_id = %correlation_id, client_ip = %ip, "Login link requested");

    let identity = service.request_link(&ip.to_string(), request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(LoginLinkResponse {
            message: "Login link sent. Check your email.".to_string(),
            identity,
        }),
    ))
}

/// Redeem a login token from a JSON body.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/verify
/// Content-Type: application/json
///
/// {
///   "token": "abc123..."
/// }
/// ```
///
/// # Response (Success)
///
/// ```json
/// {
///   "identity": "user@example.com",
///   "displayName": "Ada"
/// }
/// ```
///
/// # Response (Error)
///
/// - `401 Unauthorized`: token unknown, used, or expired
/// - `429 Too Many Requests`: rate limit exceeded
#[allow(clippy::unused_async)]
pub async fn verify_login_token<E>(
    State(service): State<Arc<LoginLinkService<E>>>,
    ClientIp(ip): ClientIp,
    Json(request): Json<VerifyRequest>,
) -> WebResult<Json<VerifiedLogin>>
where
    E: EmailSender + 'static,
{
    Ok(Json(service.verify(&ip.to_string(), &request.token)?))
}

/// Redeem a login token from the query string.
///
/// # Endpoint
///
/// ```text
/// GET /api/auth/verify?token=abc123...
/// ```
///
/// Responses match [`verify_login_token`].
#[allow(clippy::unused_async)]
pub async fn verify_login_token_query<E>(
    State(service): State<Arc<LoginLinkService<E>>>,
    ClientIp(ip): ClientIp,
    Query(request): Query<VerifyRequest>,
) -> WebResult<Json<VerifiedLogin>>
where
    E: EmailSender + 'static,
{
    Ok(Json(service.verify(&ip.to_string(), &request.token)?))
}
