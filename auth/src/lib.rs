//! # Relay Auth
//!
//! Single-use login tokens, fixed-window rate limiting, and the passwordless
//! login-link flow built on them.
//!
//! ## Features
//!
//! - **Token store**: 256-bit opaque tokens, one-hour lifetime, redeemable once
//! - **Rate limiter**: per-action fixed windows with atomic admission
//! - **Login links**: issue, email, and redeem, with revocation on delivery failure
//! - **Testable**: time is injected, email delivery is a trait
//!
//! ## Example
//!
//! ```rust
//! use relay_auth::rate_limiter::{RateLimitPolicy, RateLimiter};
//! use relay_auth::token_store::TokenStore;
//! use relay_auth::AuthError;
//! use relay_core::environment::SystemClock;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(SystemClock);
//! let tokens = TokenStore::new(clock.clone());
//! let limiter = RateLimiter::new(clock, RateLimitPolicy::new(Duration::from_secs(600), 5));
//!
//! limiter.check("verify", "203.0.113.9")?;
//! let token = tokens.issue("ada@example.com", None, None)?;
//!
//! assert_eq!(tokens.redeem(&token)?.identity, "ada@example.com");
//! assert_eq!(tokens.redeem(&token), Err(AuthError::TokenInvalidOrExpired));
//! # Ok::<(), AuthError>(())
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod error;
pub mod login;
pub mod providers;
pub mod rate_limiter;
pub mod token_store;
pub mod utils;

// Mock implementations for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::LoginLinkConfig;
pub use error::{AuthError, Result};
pub use login::{LoginLinkRequest, LoginLinkService, VerifiedLogin};
pub use rate_limiter::{Decision, RateLimitPolicy, RateLimiter, RateWindow, composite_key};
pub use token_store::{LoginIntent, TokenStore};
