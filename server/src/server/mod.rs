//! HTTP server module for the relay.
//!
//! This module provides the Axum-based HTTP server with:
//! - Application state management
//! - Health and status endpoints
//! - Client configuration endpoint
//! - Router configuration

pub mod client_config;
pub mod health;
pub mod routes;
pub mod state;

pub use health::{health_check, status};
pub use routes::build_router;
pub use state::AppState;
