//! Error types for prediction and artifact loading

use crate::predictor::ModelKind;
use thiserror::Error;

/// Failure of a single prediction call.
///
/// No variant carries a partial result: either all three models produce a
/// value or the caller gets one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    /// A required observation field was absent
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The observation could not be decoded at all
    #[error("malformed observation: {0}")]
    MalformedInput(String),

    /// A categorical value is not in the model vocabulary
    #[error("unknown value '{value}' for categorical field '{field}'")]
    UnknownCategory { field: &'static str, value: String },

    /// A model artifact failed to load at startup
    #[error("{model} model unavailable: {reason}")]
    ModelUnavailable { model: ModelKind, reason: String },

    /// A loaded model failed while running
    #[error("{model} model inference failed: {reason}")]
    Inference { model: ModelKind, reason: String },
}

impl PredictionError {
    /// Short machine-readable label, used for metrics and API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::MissingField(_) => "missing_field",
            PredictionError::MalformedInput(_) => "malformed_input",
            PredictionError::UnknownCategory { .. } => "unknown_category",
            PredictionError::ModelUnavailable { .. } => "model_unavailable",
            PredictionError::Inference { .. } => "inference_failed",
        }
    }

    /// True when the caller sent something the models cannot accept
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictionError::MissingField(_)
                | PredictionError::MalformedInput(_)
                | PredictionError::UnknownCategory { .. }
        )
    }
}

/// Failure while loading the artifact bundle.
///
/// These never reach a prediction caller directly; they are rendered into
/// the reason of an unavailable model slot.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("manifest has no entry for the {0} model")]
    MissingEntry(ModelKind),

    #[error("model file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("checksum mismatch: manifest says {expected}, file hashes to {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("invalid ONNX model: {0}")]
    Onnx(String),
}

pub type Result<T, E = PredictionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message_names_field() {
        let err = PredictionError::MissingField("speed_kmh");
        assert_eq!(err.to_string(), "missing required field 'speed_kmh'");
        assert_eq!(err.kind(), "missing_field");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_model_errors_are_not_client_errors() {
        let unavailable = PredictionError::ModelUnavailable {
            model: ModelKind::Delay,
            reason: "file not found".to_string(),
        };
        assert!(!unavailable.is_client_error());
        assert_eq!(
            unavailable.to_string(),
            "delay model unavailable: file not found"
        );

        let inference = PredictionError::Inference {
            model: ModelKind::Occupancy,
            reason: "empty output".to_string(),
        };
        assert_eq!(inference.kind(), "inference_failed");
    }
}
