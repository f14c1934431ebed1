//! Single-use login token store.
//!
//! Maps an opaque bearer token to the [`LoginIntent`] it was issued for. A
//! token moves through exactly one of two transitions:
//!
//! ```text
//! Issued ──redeem──▶ Redeemed
//!    └────ttl─────▶ Expired
//! ```
//!
//! Redemption is an atomic read-and-delete on the underlying
//! [`ExpiringStore`], so when several requests race on one token exactly one
//! of them receives the intent.

use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use relay_core::environment::Clock;
use relay_core::store::ExpiringStore;
use relay_core::sweeper::Sweepable;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default lifetime of an issued token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::hours(1);

/// Bytes of randomness per token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Characters of a token that may appear in logs.
const LOG_PREFIX_LEN: usize = 8;

/// Who asked to log in, recorded at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginIntent {
    /// Email address the link was sent to.
    pub identity: String,

    /// Optional name to greet the user with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Optional opaque scope for the login (a tenant or location id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
}

/// Issues and redeems single-use login tokens.
pub struct TokenStore {
    store: ExpiringStore<LoginIntent>,
    ttl: Duration,
}

impl TokenStore {
    /// Create a token store whose tokens live for [`DEFAULT_TOKEN_TTL`].
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: ExpiringStore::new("login_tokens", clock),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Set token time-to-live.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Token time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new token for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidIdentity`] if `identity` is blank.
    pub fn issue(
        &self,
        identity: &str,
        display_name: Option<String>,
        context: Option<String>,
    ) -> Result<String> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(AuthError::InvalidIdentity(
                "identity must not be empty".to_string(),
            ));
        }

        let token = generate_token();
        let intent = LoginIntent {
            identity: identity.to_string(),
            display_name,
            context,
            issued_at: self.store.now(),
        };
        self.store.put(token.clone(), intent, self.ttl);

        metrics::counter!("relay_tokens_issued_total").increment(1);
        info!(
            identity = %identity,
            token_prefix = %token_prefix(&token),
            ttl_secs = self.ttl.num_seconds(),
            "Login token issued"
        );

        Ok(token)
    }

    /// Redeem `token`, consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenInvalidOrExpired`] if the token was never
    /// issued, was already redeemed, or has expired.
    pub fn redeem(&self, token: &str) -> Result<LoginIntent> {
        if let Some(intent) = self.store.take(token) {
            metrics::counter!("relay_tokens_redeemed_total").increment(1);
            info!(
                identity = %intent.identity,
                token_prefix = %token_prefix(token),
                "Login token redeemed"
            );
            Ok(intent)
        } else {
            metrics::counter!("relay_token_redeem_failures_total").increment(1);
            warn!(
                token_prefix = %token_prefix(token),
                "Rejected invalid or expired login token"
            );
            Err(AuthError::TokenInvalidOrExpired)
        }
    }

    /// Discard `token` without redeeming it.
    ///
    /// Returns `true` if a live token was removed.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.store.remove(token);
        debug!(token_prefix = %token_prefix(token), removed, "Login token revoked");
        removed
    }

    /// Number of tokens held, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if no tokens are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Sweepable for TokenStore {
    fn name(&self) -> &str {
        self.store.name()
    }

    fn sweep_expired(&self) -> usize {
        self.store.sweep_expired()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("ttl", &self.ttl)
            .field("len", &self.store.len())
            .finish_non_exhaustive()
    }
}

/// Generate a 256-bit random token, URL-safe base64 without padding.
fn generate_token() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut rng = rand::thread_rng();
    let mut random_bytes = [0u8; TOKEN_BYTES];
    rng.fill_bytes(&mut random_bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// The loggable part of a token.
#[must_use]
pub fn token_prefix(token: &str) -> &str {
    token
        .char_indices()
        .nth(LOG_PREFIX_LEN)
        .map_or(token, |(end, _)| &token[..end])
}
