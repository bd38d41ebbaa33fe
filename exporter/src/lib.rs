//! Portwatch - Periodic nmap scan exporter
//!
//! Wires configuration, the target source, the scan coordinator and the HTTP
//! endpoint together and runs until SIGINT/SIGTERM.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod driver;
pub mod error;
pub mod server;
pub mod state;

use anyhow::Context;
use portwatch_core::AppConfig;
use state::AppState;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Get the application version
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,portwatch=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Run the exporter until shutdown.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Portwatch v{}", version());

    let config = AppConfig::load_with_env().context("failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let state = AppState::from_config(&config).context("failed to initialize exporter")?;

    let listener = tokio::net::TcpListener::bind(state.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", state.listen_addr))?;

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let server = tokio::spawn(server::serve(
        listener,
        state.context(),
        shutdown.clone(),
    ));

    driver::run_cycles(
        &state.coordinator,
        state.source.as_ref(),
        state.interval,
        shutdown.clone(),
    )
    .await;

    // The driver only returns once shutdown was requested.
    shutdown.cancel();
    server
        .await
        .context("HTTP server task failed")?
        .context("HTTP server error")?;

    info!("Portwatch stopped");
    Ok(())
}

/// Cancel the token on Ctrl-C or, on Unix, SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Shutdown requested");
    shutdown.cancel();
}
