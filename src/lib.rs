pub mod api;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod report;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, ConfigError};
use crate::pipeline::{load_models, InferencePipeline, PipelineError};

/// Anything that stops the service before or while it serves requests.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model loading failed: {0}")]
    Models(#[from] PipelineError),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Resolve config, load both models once, then serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = Config::from_env()?;
    match serde_json::to_string(&config) {
        Ok(json) => tracing::info!(config = %json, "Configuration resolved"),
        Err(e) => tracing::warn!("Could not serialize config for logging: {e}"),
    }

    let models = load_models(&config)?;
    let pipeline = Arc::new(InferencePipeline::from_models(models, &config));

    api::serve(config.bind_addr, pipeline).await?;
    Ok(())
}
