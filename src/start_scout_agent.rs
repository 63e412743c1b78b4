//! Startup helpers for the scout agent server.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use crate::conversation::core::config::ScoutConfig;
use crate::server::{self, AppState};

/// Run the server until Ctrl-C (used by the `scout-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting scout agent v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve()) {
        tracing::error!("Server error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Load configuration and build application state without starting the server.
///
/// # Errors
/// Returns an error if the configuration is invalid or a backend fails to start.
pub async fn initialize() -> anyhow::Result<(ScoutConfig, Arc<AppState>)> {
    let config = ScoutConfig::from_env().context("failed to read configuration")?;
    config.validate().context("invalid configuration")?;
    tracing::info!(
        "Model provider: {:?}, interview mode: {:?}",
        config.model.provider,
        config.agent.mode
    );

    let state = AppState::new(&config)
        .await
        .context("failed to create application state")?;
    Ok((config, state))
}

async fn serve() -> anyhow::Result<()> {
    let (config, state) = initialize().await?;

    let sweeper = tokio::spawn({
        let state = Arc::clone(&state);
        async move { state.registry.run_cleanup().await }
    });

    let served = server::run_server_with_shutdown(
        state,
        config.server.port,
        &config.server.static_dir,
        shutdown_signal(),
    )
    .await;
    sweeper.abort();
    served.context("server stopped unexpectedly")?;
    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
