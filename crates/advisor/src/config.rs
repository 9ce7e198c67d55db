//! Advisor configuration

use advisor_lib::predictor::DEFAULT_MAX_MODEL_BYTES;
use advisor_lib::LoadConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Advisor service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Directory holding manifest.json and the ONNX models
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// API server port for predictions, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Largest model file accepted at startup
    #[serde(default = "default_max_model_bytes")]
    pub max_model_bytes: u64,

    /// Verify manifest checksums before loading models
    #[serde(default = "default_verify_checksums")]
    pub verify_checksums: bool,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("/var/lib/train-advisor/models")
}

fn default_api_port() -> u16 {
    8080
}

fn default_max_model_bytes() -> u64 {
    DEFAULT_MAX_MODEL_BYTES
}

fn default_verify_checksums() -> bool {
    true
}

impl AdvisorConfig {
    /// Load configuration from `ADVISOR_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ADVISOR").try_parsing(true))
            .build()
            .context("Failed to read advisor configuration")?;

        config
            .try_deserialize()
            .context("Invalid advisor configuration")
    }

    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            max_model_bytes: self.max_model_bytes,
            verify_checksums: self.verify_checksums,
        }
    }
}
