pub mod api; // HTTP surface: detect-age + health
pub mod config;
pub mod forwarder; // Upload validation, relay, response normalization
pub mod normalizer; // Client-side resize + brightness/contrast
pub mod prediction;
pub mod session; // Detection lifecycle, camera, detect client

#[cfg(test)]
pub(crate) mod test_support;

use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(std::io::Error),
}

/// Start the forwarder and serve until Ctrl-C.
pub async fn run() -> Result<(), RunError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = config::AppConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    let mut server = api::start_server(&app_config).await?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    tokio::signal::ctrl_c().await.map_err(RunError::Signal)?;

    server.shutdown();
    server.stopped().await;
    Ok(())
}
