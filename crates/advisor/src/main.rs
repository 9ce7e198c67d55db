//! Train Advisor - delay, disruption and occupancy advisories
//!
//! Loads the three prediction models once at startup and serves advisory
//! payloads for the downstream scheduler over HTTP.

use advisor_lib::{
    observability::{AdvisorMetrics, StructuredLogger},
    Predictor,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use train_advisor::{api, config};

const ADVISOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting train-advisor");

    let config = config::AdvisorConfig::load()?;
    info!(
        instance = %config.instance_name,
        models_dir = %config.models_dir.display(),
        "Advisor configured"
    );

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(ADVISOR_VERSION, &config.models_dir.display().to_string());

    // Models are loaded exactly once; a broken artifact leaves the service up
    // but unready so the failure is visible on /readyz
    let predictor = Predictor::load(&config.models_dir, &config.load_config());
    logger.log_models_loaded(predictor.models());

    let metrics = AdvisorMetrics::new();
    metrics.set_model_versions(predictor.models());

    let app_state = Arc::new(api::AppState::new(predictor, metrics, logger.clone()));

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    logger.log_shutdown("API server failed");
                    return Err(e);
                }
                Err(e) => {
                    logger.log_shutdown("API server task aborted");
                    return Err(e.into());
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
