//! Passwordless login-link flow.
//!
//! Ties the rate limiter, the token store and an [`EmailSender`] together:
//!
//! 1. [`LoginLinkService::request_link`] rate-limits by `(client, identity)`,
//!    validates the address, issues a token, and emails a link containing it.
//! 2. [`LoginLinkService::verify`] rate-limits by client and redeems the token.
//!
//! If the email cannot be delivered the token is revoked, so a link that never
//! reached its recipient cannot be redeemed later.

use crate::config::LoginLinkConfig;
use crate::error::{AuthError, Result};
use crate::providers::{EmailSender, LoginLinkEmail};
use crate::rate_limiter::{RateLimiter, composite_key};
use crate::token_store::{LoginIntent, TokenStore};
use crate::utils::{is_valid_email, normalize_identity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Rate-limit action for issuing login links.
pub const LOGIN_LINK_ACTION: &str = "login_link";

/// Rate-limit action for redeeming login tokens.
pub const VERIFY_ACTION: &str = "verify";

/// A request for a login link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginLinkRequest {
    /// Email address to send the link to.
    pub identity: String,

    /// Optional name to greet the user with.
    #[serde(default)]
    pub display_name: Option<String>,

    /// Optional opaque scope for the login.
    #[serde(default)]
    pub context: Option<String>,
}

/// What a successful redemption reveals to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedLogin {
    /// Email address the link was sent to.
    pub identity: String,

    /// Name supplied when the link was requested.
    pub display_name: Option<String>,
}

impl From<LoginIntent> for VerifiedLogin {
    fn from(intent: LoginIntent) -> Self {
        Self {
            identity: intent.identity,
            display_name: intent.display_name,
        }
    }
}

/// Issues and redeems login links.
pub struct LoginLinkService<E> {
    tokens: Arc<TokenStore>,
    limiter: Arc<RateLimiter>,
    sender: E,
    config: LoginLinkConfig,
}

impl<E: EmailSender> LoginLinkService<E> {
    /// Create a new login-link service.
    #[must_use]
    pub const fn new(
        tokens: Arc<TokenStore>,
        limiter: Arc<RateLimiter>,
        sender: E,
        config: LoginLinkConfig,
    ) -> Self {
        Self {
            tokens,
            limiter,
            sender,
            config,
        }
    }

    /// Token store backing this service.
    #[must_use]
    pub const fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Rate limiter backing this service.
    #[must_use]
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Email sender.
    #[must_use]
    pub const fn sender(&self) -> &E {
        &self.sender
    }

    /// Link configuration.
    #[must_use]
    pub const fn config(&self) -> &LoginLinkConfig {
        &self.config
    }

    /// Issue a token for `request.identity` and email the link.
    ///
    /// `client` identifies the caller (usually its IP address) for rate
    /// limiting. Returns the normalized identity the link was sent to.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RateLimited`] if this client asked for this identity too often
    /// - [`AuthError::InvalidIdentity`] if the identity is not an email address
    /// - [`AuthError::EmailDeliveryFailed`] if the email could not be sent
    pub async fn request_link(&self, client: &str, request: LoginLinkRequest) -> Result<String> {
        let identity = normalize_identity(&request.identity);

        self.limiter
            .check(LOGIN_LINK_ACTION, &composite_key(&[client, &identity]))?;

        if !is_valid_email(&identity) {
            return Err(AuthError::InvalidIdentity(
                "identity must be a valid email address".to_string(),
            ));
        }

        let token = self
            .tokens
            .issue(&identity, request.display_name.clone(), request.context)?;

        let email = LoginLinkEmail {
            to: identity.clone(),
            display_name: request.display_name,
            link: self.config.link_for(&token),
            expires_in: self.tokens.ttl(),
        };

        if let Err(error) = self.sender.send_login_link(&email).await {
            self.tokens.revoke(&token);
            warn!(identity = %identity, error = %error, "Login link delivery failed; token revoked");
            return Err(error);
        }

        info!(identity = %identity, client = %client, "Login link sent");
        Ok(identity)
    }

    /// Redeem a token from a login link.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RateLimited`] if this client is verifying too often
    /// - [`AuthError::TokenInvalidOrExpired`] if the token cannot be redeemed
    pub fn verify(&self, client: &str, token: &str) -> Result<VerifiedLogin> {
        self.limiter.check(VERIFY_ACTION, client)?;
        self.tokens.redeem(token.trim()).map(VerifiedLogin::from)
    }
}

impl<E> std::fmt::Debug for LoginLinkService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginLinkService")
            .field("tokens", &self.tokens)
            .field("limiter", &self.limiter)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
