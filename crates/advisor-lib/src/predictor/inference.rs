//! ONNX inference using tract
//!
//! Runs the exported regression models (random forests converted to ONNX)
//! on a single feature row.

use super::features::NUM_FEATURES;
use super::ModelKind;
use crate::error::{ArtifactError, PredictionError, Result};
use crate::models::FeatureVector;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning (5ms target)
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A loaded regression estimator.
///
/// Implementations must be safe to call from several threads at once; the
/// predictor never mutates a model after loading it.
pub trait RegressionModel: Send + Sync {
    /// Predict a single value for one feature row
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    /// Version string reported by the artifact
    fn version(&self) -> &str;
}

/// ONNX-based regressor using tract for lightweight inference
pub struct OnnxRegressor {
    kind: ModelKind,
    version: String,
    model: TractModel,
}

impl std::fmt::Debug for OnnxRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxRegressor")
            .field("kind", &self.kind)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl OnnxRegressor {
    /// Create a regressor from model bytes
    pub fn from_bytes(
        kind: ModelKind,
        version: impl Into<String>,
        model_bytes: &[u8],
    ) -> Result<Self, ArtifactError> {
        let model = Self::load_model(model_bytes)?;
        Ok(Self {
            kind,
            version: version.into(),
            model,
        })
    }

    /// Load and optimize an ONNX model from bytes, pinning the input to one row
    fn load_model(model_bytes: &[u8]) -> Result<TractModel, ArtifactError> {
        let onnx_err = |stage: &str, e: TractError| ArtifactError::Onnx(format!("{}: {}", stage, e));

        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| onnx_err("failed to parse model", e))?;

        let inputs = model
            .input_outlets()
            .map_err(|e| onnx_err("failed to read model inputs", e))?
            .len();
        if inputs != 1 {
            return Err(ArtifactError::Onnx(format!(
                "model declares {} inputs, expected a single [1, {}] tensor",
                inputs, NUM_FEATURES
            )));
        }

        model
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .map_err(|e| onnx_err("failed to set input shape", e))?
            .into_optimized()
            .map_err(|e| onnx_err("failed to optimize model", e))?
            .into_runnable()
            .map_err(|e| onnx_err("failed to create runnable model", e))
    }

    fn inference_error(&self, reason: impl Into<String>) -> PredictionError {
        PredictionError::Inference {
            model: self.kind,
            reason: reason.into(),
        }
    }

    /// Convert feature vector to tensor input
    fn features_to_tensor(&self, features: &FeatureVector) -> Result<Tensor> {
        let data = features.to_array().to_vec();
        let array = tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), data)
            .map_err(|e| self.inference_error(e.to_string()))?;
        Ok(array.into())
    }
}

impl RegressionModel for OnnxRegressor {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let start = Instant::now();
        let input = self.features_to_tensor(features)?;

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| self.inference_error(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| self.inference_error("no output from model"))?;

        // skl2onnx emits float32 for regressors but float64 graphs do exist
        let values = output
            .cast_to::<f32>()
            .map_err(|e| self.inference_error(e.to_string()))?;
        let value = values
            .as_slice::<f32>()
            .map_err(|e| self.inference_error(e.to_string()))?
            .first()
            .copied()
            .ok_or_else(|| self.inference_error("model returned an empty tensor"))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(
                model = %self.kind,
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(model = %self.kind, elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(value as f64)
    }

    fn version(&self) -> &str {
        &self.version
    }
}
