//! Axum adapters for the relay.
//!
//! This crate is the HTTP shell around `relay-auth`:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         HTTP shell (Axum)               │  ← JSON, headers, status codes
//! │  - Extractors (client IP, correlation)  │  ← Rate-limit middleware
//! │  - AppError → JSON error bodies         │  ← Logging
//! ├─────────────────────────────────────────┤
//! │         relay-auth                      │
//! │  - Token store, rate limiter            │  ← Testable with a mock clock
//! │  - Login-link service                   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use relay_web::{correlation_id_layer, login_router};
//! use axum::Router;
//!
//! let app = Router::new()
//!     .nest("/api/auth", login_router(service))
//!     .layer(correlation_id_layer());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ClientIp, CorrelationId};
pub use middleware::{
    CORRELATION_ID_HEADER, RATE_LIMIT_REMAINING_HEADER, RouteRateLimit, correlation_id_layer,
    rate_limit,
};
pub use router::login_router;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
