//! QStash Receiver - web server for verified QStash deliveries.
//!
//! This binary provides a small web server that:
//! - Receives deliveries from QStash
//! - Verifies the `Upstash-Signature` token with the current and next signing keys
//! - Rejects anything that does not verify

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qstash::web::router;
use qstash::{AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("receiver_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        signing_keys_configured = config.signing_key().is_some(),
        receiver_url = ?config.receiver_url,
        clock_tolerance_secs = config.clock_tolerance_secs,
        "config_loaded"
    );

    if config.has_partial_signing_key() {
        bail!("QSTASH_CURRENT_SIGNING_KEY and QSTASH_NEXT_SIGNING_KEY must be set together");
    }

    let state = AppState::new(config.clone());
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "receiver_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("receiver_shutdown_complete");

    Ok(())
}

/// Wait for SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut terminate) => tokio::select! {
                _ = wait_for_ctrl_c() => {}
                _ = terminate.recv() => info!(signal = "SIGTERM", "shutdown_signal_received"),
            },
            Err(e) => {
                warn!(error = %e, "sigterm_handler_unavailable");
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;

    info!("receiver_shutting_down");
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!(signal = "SIGINT", "shutdown_signal_received"),
        // Without a signal handler the server runs until killed.
        Err(e) => {
            warn!(error = %e, "sigint_handler_unavailable");
            std::future::pending::<()>().await;
        }
    }
}
