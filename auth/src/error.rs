//! Error types for login-link and rate-limiting operations.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failure modes of the token store, rate limiter and login-link flow.
///
/// None of these are fatal to the process; every variant describes a request
/// the caller may retry or report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Token Errors
    // ═══════════════════════════════════════════════════════════

    /// Token is unknown, already redeemed, or expired.
    ///
    /// The three cases are indistinguishable to callers.
    #[error("Login token is invalid or has expired")]
    TokenInvalidOrExpired,

    /// Identity is empty or not a usable address.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    // ═══════════════════════════════════════════════════════════
    // Rate Limiting
    // ═══════════════════════════════════════════════════════════

    /// Request ceiling reached for the current window.
    #[error("Too many requests, please retry after {retry_after:?}")]
    RateLimited {
        /// Time until the current window resets.
        retry_after: Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Email delivery failed.
    #[error("Failed to send email: {0}")]
    EmailDeliveryFailed(String),

    /// A required setting is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Returns `true` if this error is due to something the caller sent.
    ///
    /// # Examples
    ///
    /// ```
    /// # use relay_auth::AuthError;
    /// assert!(AuthError::TokenInvalidOrExpired.is_user_error());
    /// assert!(!AuthError::Configuration("SMTP_HOST".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::TokenInvalidOrExpired | Self::InvalidIdentity(_) | Self::RateLimited { .. }
        )
    }

    /// Seconds a client should wait before retrying, rounded up.
    ///
    /// Only rate-limit errors carry a retry hint.
    ///
    /// # Examples
    ///
    /// ```
    /// # use relay_auth::AuthError;
    /// # use std::time::Duration;
    /// let err = AuthError::RateLimited { retry_after: Duration::from_millis(1500) };
    /// assert_eq!(err.retry_after_secs(), Some(2));
    /// assert_eq!(AuthError::TokenInvalidOrExpired.retry_after_secs(), None);
    /// ```
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => Some(ceil_secs(*retry_after)),
            _ => None,
        }
    }
}

/// Round a duration up to whole seconds.
#[must_use]
pub fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
