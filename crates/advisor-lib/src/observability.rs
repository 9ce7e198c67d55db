//! Observability infrastructure for the advisor
//!
//! Provides:
//! - Prometheus metrics (prediction latency, prediction/error counts, loaded model versions)
//! - Structured JSON logging with tracing

use crate::error::PredictionError;
use crate::models::PredictionResult;
use crate::predictor::{ModelKind, ModelSet};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AdvisorMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AdvisorMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_generated: IntCounter,
    prediction_errors: IntCounterVec,
    model_version_info: GaugeVec,
}

impl AdvisorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "train_advisor_prediction_latency_seconds",
                "Time spent validating, encoding and running all three models",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_generated: register_int_counter!(
                "train_advisor_predictions_generated_total",
                "Total number of predictions generated"
            )
            .expect("Failed to register predictions_generated"),

            prediction_errors: register_int_counter_vec!(
                "train_advisor_prediction_errors_total",
                "Total number of failed predictions by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors"),

            model_version_info: register_gauge_vec!(
                "train_advisor_model_version_info",
                "Loaded model versions; value is 1 when loaded, 0 when unavailable",
                &["model", "version"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Advisor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AdvisorMetrics {
    _private: (),
}

impl Default for AdvisorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AdvisorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AdvisorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record a prediction latency observation
    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    /// Increment predictions generated counter
    pub fn inc_predictions_generated(&self) {
        self.inner().predictions_generated.inc();
    }

    /// Increment the error counter for this failure's kind
    pub fn inc_prediction_errors(&self, error: &PredictionError) {
        self.inner()
            .prediction_errors
            .with_label_values(&[error.kind()])
            .inc();
    }

    /// Publish one version gauge per model slot
    pub fn set_model_versions(&self, models: &ModelSet) {
        let gauge = &self.inner().model_version_info;
        gauge.reset();
        for kind in ModelKind::ALL {
            let slot = models.slot(kind);
            let version = slot.version().unwrap_or("unavailable");
            let loaded = if slot.is_ready() { 1.0 } else { 0.0 };
            gauge.with_label_values(&[kind.as_str(), version]).set(loaded);
        }
    }
}

/// Structured logger for advisor events
///
/// Provides consistent JSON-formatted logging for predictions, model
/// loading and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log advisor startup
    pub fn log_startup(&self, version: &str, models_dir: &str) {
        info!(
            event = "advisor_started",
            instance = %self.instance,
            advisor_version = %version,
            models_dir = %models_dir,
            "Train advisor started"
        );
    }

    /// Log the outcome of loading each model
    pub fn log_models_loaded(&self, models: &ModelSet) {
        for kind in ModelKind::ALL {
            let slot = models.slot(kind);
            match slot.unavailable_reason() {
                None => info!(
                    event = "models_loaded",
                    instance = %self.instance,
                    model = %kind,
                    version = slot.version().unwrap_or_default(),
                    "Model ready"
                ),
                Some(reason) => warn!(
                    event = "model_unavailable",
                    instance = %self.instance,
                    model = %kind,
                    reason = %reason,
                    "Model unavailable, predictions will fail"
                ),
            }
        }
    }

    /// Log a prediction generation event
    pub fn log_prediction(&self, result: &PredictionResult, elapsed_us: u128) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            train_id = %result.train_id,
            predicted_delay_min = result.predicted_delay_min,
            predicted_disruption_chance = result.predicted_disruption_chance,
            predicted_occupancy = result.predicted_occupancy.track1,
            elapsed_us = elapsed_us as u64,
            "Generated train prediction"
        );
    }

    /// Log a failed prediction
    pub fn log_prediction_failed(&self, train_id: Option<&str>, error: &PredictionError) {
        if error.is_client_error() {
            info!(
                event = "prediction_failed",
                instance = %self.instance,
                train_id = train_id.unwrap_or("unknown"),
                kind = error.kind(),
                error = %error,
                "Rejected observation"
            );
        } else {
            warn!(
                event = "prediction_failed",
                instance = %self.instance,
                train_id = train_id.unwrap_or("unknown"),
                kind = error.kind(),
                error = %error,
                "Prediction failed"
            );
        }
    }

    /// Log advisor shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "advisor_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Train advisor shutting down"
        );
    }
}
