//! Login-link router composition.

use crate::handlers::login_link;
use axum::{
    Router,
    routing::{get, post},
};
use relay_auth::LoginLinkService;
use relay_auth::providers::EmailSender;
use std::sync::Arc;

/// Create the router for the login-link endpoints.
///
/// # Routes
///
/// - `POST /login-link` - Email a login link
/// - `POST /verify` - Redeem a token (JSON body)
/// - `GET /verify?token=` - Redeem a token (query string)
///
/// Both flows rate-limit inside the service, so no extra layer is needed.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .nest("/api/auth", login_router(Arc::new(service)))
///     .layer(TraceLayer::new_for_http());
/// ```
pub fn login_router<E>(service: Arc<LoginLinkService<E>>) -> Router
where
    E: EmailSender + 'static,
{
    Router::new()
        .route("/login-link", post(login_link::request_login_link::<E>))
        .route(
            "/verify",
            post(login_link::verify_login_token::<E>).get(login_link::verify_login_token_query::<E>),
        )
        .with_state(service)
}
