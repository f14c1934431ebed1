//! HTTP error responses.
//!
//! [`AppError`] bridges domain errors and HTTP responses by implementing
//! Axum's `IntoResponse`. Every error renders as a JSON body:
//!
//! ```json
//! { "code": "RATE_LIMITED", "message": "...", "retryAfterSeconds": 42 }
//! ```
//!
//! `retryAfterSeconds` (and the matching `Retry-After` header) is only present
//! on `429` responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use relay_auth::AuthError;
use relay_auth::error::ceil_secs;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Error returned by handlers, rendered as a JSON error body.
///
/// # Examples
///
/// ```ignore
/// async fn redeem(Json(body): Json<VerifyBody>) -> WebResult<Json<VerifiedLogin>> {
///     let token = body.token.ok_or_else(|| AppError::bad_request("token is required"))?;
///     Ok(Json(service.verify(&ip, &token)?))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    /// Shown to the client.
    message: String,
    /// Stable machine-readable code, e.g. `RATE_LIMITED`.
    code: String,
    /// Only set on 429.
    retry_after_secs: Option<u64>,
    /// Logged, never serialized.
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Error with an explicit status, message, and code.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
            retry_after_secs: None,
            source: None,
        }
    }

    /// Attach an internal cause, logged but never sent to the client.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the machine-readable error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// `400 BAD_REQUEST`.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// `401 UNAUTHORIZED`.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// `422 VALIDATION_ERROR`.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// `429 RATE_LIMITED` with a `Retry-After` header.
    ///
    /// `retry_after` is rounded up to whole seconds.
    #[must_use]
    pub fn too_many_requests(retry_after: Duration) -> Self {
        let secs = ceil_secs(retry_after);
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            format!("Too many requests, retry in {secs} seconds"),
            "RATE_LIMITED",
        );
        err.retry_after_secs = Some(secs);
        err
    }

    /// `500 INTERNAL_SERVER_ERROR`.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_SERVER_ERROR")
    }

    /// `502 BAD_GATEWAY`.
    #[must_use]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message, "BAD_GATEWAY")
    }

    /// `504 GATEWAY_TIMEOUT`.
    #[must_use]
    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message, "GATEWAY_TIMEOUT")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status.as_u16(), self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            let cause = self.source.as_ref().map(|e| format!("{e:#}"));
            tracing::error!(
                status = self.status.as_u16(),
                code = %self.code,
                cause = cause.as_deref().unwrap_or("-"),
                "{}",
                self.message
            );
        }

        let mut response = (
            self.status,
            Json(ErrorResponse {
                code: self.code,
                message: self.message,
                retry_after_seconds: self.retry_after_secs,
            }),
        )
            .into_response();

        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("Something went wrong on our side").with_source(err)
    }
}

/// Map domain errors to HTTP.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenInvalidOrExpired => {
                Self::unauthorized(err.to_string()).with_code("TOKEN_INVALID_OR_EXPIRED")
            }
            AuthError::RateLimited { retry_after } => Self::too_many_requests(retry_after),
            AuthError::InvalidIdentity(reason) => {
                Self::validation(reason).with_code("INVALID_IDENTITY")
            }
            AuthError::EmailDeliveryFailed(_) => {
                Self::bad_gateway("Could not send the login email, please try again")
                    .with_code("EMAIL_DELIVERY_FAILED")
                    .with_source(anyhow::Error::new(err))
            }
            AuthError::Configuration(_) => Self::internal("Service is misconfigured")
                .with_code("CONFIGURATION_ERROR")
                .with_source(anyhow::Error::new(err)),
        }
    }
}
