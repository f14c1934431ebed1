//! Application state for the relay HTTP server.

use crate::config::Config;
use crate::llm::LlmClient;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_auth::{RateLimiter, TokenStore};
use relay_core::environment::Clock;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// It's cloned (cheaply via Arc) for each request. The login-link service is
/// not part of it; its routes carry their own state.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<Config>,

    /// Time source for response timestamps
    pub clock: Arc<dyn Clock>,

    /// Outstanding login tokens
    pub tokens: Arc<TokenStore>,

    /// Shared limiter for every action
    pub limiter: Arc<RateLimiter>,

    /// Completion API client
    pub llm: LlmClient,

    /// Prometheus renderer for `/metrics`
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
        tokens: Arc<TokenStore>,
        limiter: Arc<RateLimiter>,
        llm: LlmClient,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            config,
            clock,
            tokens,
            limiter,
            llm,
            metrics,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .field("limiter", &self.limiter)
            .field("llm", &self.llm)
            .finish_non_exhaustive()
    }
}
