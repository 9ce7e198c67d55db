//! HTTP API for predictions, health checks and Prometheus metrics

use advisor_lib::{
    observability::{AdvisorMetrics, StructuredLogger},
    ComponentStatus, HealthResponse, ObservationRecord, PredictionError, Predictor,
    ReadinessResponse,
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub metrics: AdvisorMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(predictor: Predictor, metrics: AdvisorMetrics, logger: StructuredLogger) -> Self {
        Self {
            predictor: Arc::new(predictor),
            metrics,
            logger,
        }
    }
}

/// Error body returned by the predict endpoint
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

struct ApiError(PredictionError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PredictionError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            PredictionError::MissingField(_) | PredictionError::UnknownCategory { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PredictionError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PredictionError::Inference { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Predict delay, disruption and occupancy for one train
async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let start = Instant::now();

    let outcome = match serde_json::from_slice::<ObservationRecord>(&body) {
        Ok(record) => {
            let train_id = record.train_id.clone();
            state
                .predictor
                .predict_record(record)
                .map_err(|e| (train_id, e))
        }
        Err(e) => Err((None, PredictionError::MalformedInput(e.to_string()))),
    };

    let elapsed = start.elapsed();
    state.metrics.observe_prediction_latency(elapsed.as_secs_f64());

    match outcome {
        Ok(result) => {
            state.metrics.inc_predictions_generated();
            state.logger.log_prediction(&result, elapsed.as_micros());
            (StatusCode::OK, Json(result)).into_response()
        }
        Err((train_id, e)) => {
            state.logger.log_prediction_failed(train_id.as_deref(), &e);
            state.metrics.inc_prediction_errors(&e);
            ApiError(e).into_response()
        }
    }
}

/// Health check response - returns 200 if every model loaded, 503 otherwise
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = HealthResponse::from_models(state.predictor.models());

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = ReadinessResponse::from_models(state.predictor.models());

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/predict", post(predict))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
