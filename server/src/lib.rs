//! # Relay Server
//!
//! HTTP relay that keeps secrets server-side for browser clients:
//!
//! - **Login links**: passwordless sign-in with single-use, one-hour tokens
//! - **Completion proxy**: forwards chat requests with a server-held API key,
//!   rate limited per client
//! - **Client configuration**: serves public backend settings
//! - **Operations**: health, status, and Prometheus metrics
//!
//! All state is in memory; expired tokens and rate windows are reclaimed by a
//! background sweeper.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod llm;
pub mod metrics;
pub mod server;

pub use config::Config;
pub use llm::LlmClient;
pub use server::{AppState, build_router};
