//! Mail Relay Web Server - receives provider events over HTTP.
//!
//! This binary:
//! - Relays delivery, bounce and complaint notifications to tenant webhooks
//! - Answers received-mail verdicts with a rule-set disposition, bouncing spam
//!
//! Every request is handled inline; there is no queue behind it.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailrelay::web::router;
use mailrelay::{AppState, Config, Dispatcher, SesBounceApi};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!(
        port = config.port,
        base_domain = %config.base_domain,
        webhook_path = %config.webhook_path,
        api_token_set = !config.api_token.is_empty(),
        event_auth_set = config.event_auth_token.is_some(),
        local_hostnames = config.local_hostnames.len(),
        max_redirects = config.max_redirects,
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    let dispatcher = Dispatcher::new(config.clone()).context("Failed to create dispatcher")?;
    let bounce_api = SesBounceApi::from_env().await;

    let state = AppState::new(config.clone(), dispatcher, bounce_api)
        .context("Failed to create application state")?;
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
