//! Startup helpers for the chatbot API server.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, anyhow};

use crate::config::AppConfig;
use crate::server::{self, AppState};

/// Run the server until Ctrl-C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    // A missing .env file is fine; the process environment still applies.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting chatbot API v{}", env!("CARGO_PKG_VERSION"));

    match serve() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn serve() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        model = %config.anthropic.model,
        profile = %config.chat.profile,
        db = %config.database.sqlite_path.display(),
        "configuration loaded"
    );
    let addr = bind_address(&config)?;

    let rt = tokio::runtime::Runtime::new().context("failed to create runtime")?;
    rt.block_on(async {
        let state = initialize(&config).await?;
        server::run_server_with_shutdown(state, addr, shutdown_signal())
            .await
            .map_err(|e| anyhow!("server error: {e}"))
    })
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if state creation fails.
pub async fn initialize(config: &AppConfig) -> anyhow::Result<Arc<AppState>> {
    AppState::from_config(config)
        .await
        .map_err(|e| anyhow!("failed to create state: {e}"))
}

/// Socket address from the server configuration.
///
/// # Errors
/// Returns an error if host and port do not form a valid address.
pub fn bind_address(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let mut config = AppConfig::default();
        assert_eq!(bind_address(&config).unwrap().port(), 8000);

        config.server.host = "not a host".to_string();
        assert!(bind_address(&config).is_err());
    }
}
