//! Relay HTTP server.
//!
//! Passwordless login links, a rate-limited completion proxy, and client
//! configuration, all backed by in-memory expiring stores.

use anyhow::Context;
use relay_auth::{LoginLinkService, TokenStore};
use relay_core::Sweeper;
use relay_core::environment::{Clock, SystemClock};
use relay_server::{AppState, Config, LlmClient, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_server=info,relay_web=info,relay_auth=info,relay_core=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Relay HTTP Server");
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!(
        environment = %config.server.environment,
        bind = %config.server.bind_address(),
        llm_key_configured = config.llm.has_api_key(),
        cors_origins = config.server.cors_allowed_origins.len(),
        "Configuration loaded"
    );

    let metrics = relay_server::metrics::install_recorder()
        .context("failed to install Prometheus recorder")?;

    // Stores
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tokens = Arc::new(TokenStore::new(clock.clone()).with_ttl(config.login.token_ttl()));
    let limiter = Arc::new(config.rate_limits.build_limiter(clock.clone()));

    // Login links
    let mailer = config
        .email
        .build_mailer()
        .context("invalid SMTP configuration")?;
    info!(mailer = mailer.kind(), "Email delivery configured");
    if mailer.kind() == "console" && config.server.environment == "production" {
        warn!("Login links are printed to the console; set SMTP_HOST and EMAIL_FROM to send email");
    }
    let login = Arc::new(LoginLinkService::new(
        tokens.clone(),
        limiter.clone(),
        mailer,
        config.login.link_config(),
    ));

    // Completion proxy
    let llm = LlmClient::new(&config.llm).context("failed to build HTTP client")?;
    if !llm.is_configured() {
        warn!("LLM_API_KEY is not set; completion requests will fail");
    }

    // Sweeper
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let sweeper = Sweeper::new(config.sweeper.interval())
        .register(tokens.clone())
        .register(limiter.clone())
        .spawn(shutdown_rx);

    let state = AppState::new(config.clone(), clock, tokens, limiter, llm, metrics);
    let app = build_router(state, login);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped, stopping sweeper");
    if shutdown_tx.send(()).is_err() {
        warn!("Sweeper already stopped");
    }
    if let Err(e) = sweeper.await {
        error!(error = %e, "Sweeper task failed");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the error is logged and that signal is
/// ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
