//! Prometheus metrics for the relay.
//!
//! Describes every metric the relay emits and installs the Prometheus
//! recorder that backs `GET /metrics`.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and describe all metrics.
///
/// Call once at startup.
///
/// # Errors
///
/// Returns error if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();

    tracing::info!("Prometheus recorder installed, metrics served at /metrics");
    Ok(handle)
}

/// Register descriptions for the relay's metrics.
pub fn register_metrics() {
    // Stores
    describe_counter!(
        "relay_store_swept_total",
        "Expired entries removed by the sweeper, per store"
    );
    describe_gauge!(
        "relay_store_entries",
        "Entries held by each store after the last sweep"
    );

    // Login tokens
    describe_counter!("relay_tokens_issued_total", "Login tokens issued");
    describe_counter!(
        "relay_tokens_redeemed_total",
        "Login tokens redeemed successfully"
    );
    describe_counter!(
        "relay_token_redeem_failures_total",
        "Redemptions of unknown, used, or expired tokens"
    );

    // Rate limiting
    describe_counter!(
        "relay_rate_limit_decisions_total",
        "Rate-limit decisions by action and outcome"
    );

    // LLM proxy
    describe_counter!(
        "relay_llm_requests_total",
        "Requests forwarded to the completion API, by outcome"
    );
}
