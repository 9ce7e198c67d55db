//! ML prediction engine

mod artifacts;
mod features;
mod inference;
mod output;

pub use artifacts::{
    compute_checksum, ArtifactInfo, BundleManifest, LoadConfig, ModelEntry, ModelSet, ModelSlot,
    DEFAULT_MAX_MODEL_BYTES, MANIFEST_FILE,
};
pub use features::{
    FeatureEncoder, FeatureSchema, CATEGORICAL_FEATURES, FEATURE_NAMES, NUM_FEATURES,
};
pub use inference::{OnnxRegressor, RegressionModel};
pub use output::{
    format_number, round_to, OutputFormatter, RawPredictions, OCCUPANCY_ADVISORY_THRESHOLD,
    PREDICTION_DECIMALS,
};

use crate::error::{PredictionError, Result};
use crate::models::{FeatureVector, ObservationRecord, PredictionResult, TrainObservation};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// The three estimators the advisor runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Delay,
    Disruption,
    Occupancy,
}

impl ModelKind {
    /// Every model, in inference order
    pub const ALL: [ModelKind; 3] = [ModelKind::Delay, ModelKind::Disruption, ModelKind::Occupancy];

    /// Name used in manifests, logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Delay => "delay",
            ModelKind::Disruption => "disruption",
            ModelKind::Occupancy => "occupancy",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns train observations into advisory predictions.
///
/// Holds the models it was given for its whole lifetime. Calls take `&self`
/// and share nothing mutable, so one instance can serve many callers.
#[derive(Debug, Clone)]
pub struct Predictor {
    models: ModelSet,
    formatter: OutputFormatter,
}

impl Predictor {
    pub fn new(models: ModelSet) -> Self {
        Self {
            models,
            formatter: OutputFormatter::new(),
        }
    }

    /// Load the bundle in `dir` and wrap it
    pub fn load(dir: &Path, config: &LoadConfig) -> Self {
        Self::new(ModelSet::load(dir, config))
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Validate a wire record, then predict
    pub fn predict_record(&self, record: ObservationRecord) -> Result<PredictionResult> {
        let obs = record.validate()?;
        self.predict(&obs)
    }

    /// Run all three models on one observation.
    ///
    /// Every model must be loaded and the observation must encode cleanly
    /// before the first model runs; any model failure discards the others'
    /// outputs.
    pub fn predict(&self, obs: &TrainObservation) -> Result<PredictionResult> {
        let ready = self.models.ready()?;
        let features = ready.encoder.encode(obs)?;

        let raw = RawPredictions {
            delay_min: run_model(ModelKind::Delay, ready.delay, &features)?,
            disruption_chance: run_model(ModelKind::Disruption, ready.disruption, &features)?,
            occupancy: run_model(ModelKind::Occupancy, ready.occupancy, &features)?,
        };

        debug!(
            train_id = %obs.train_id,
            delay = raw.delay_min,
            disruption = raw.disruption_chance,
            occupancy = raw.occupancy,
            "Raw model outputs"
        );

        Ok(self.formatter.format(obs, raw))
    }

    /// Encode an observation without running any model
    pub fn encode(&self, obs: &TrainObservation) -> Result<FeatureVector> {
        self.models.encoder()?.encode(obs)
    }
}

fn run_model(kind: ModelKind, model: &dyn RegressionModel, features: &FeatureVector) -> Result<f64> {
    let value = model.predict(features)?;
    if !value.is_finite() {
        return Err(PredictionError::Inference {
            model: kind,
            reason: format!("model produced non-finite value {}", value),
        });
    }
    Ok(value)
}

#[cfg(test)]
pub(crate) mod tests {
    pub(crate) use super::features::tests::{test_observation, test_schema};
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Returns a fixed value and records every feature vector it sees
    pub(crate) struct FixedModel {
        value: f64,
        seen: Mutex<Vec<FeatureVector>>,
    }

    impl FixedModel {
        pub(crate) fn new(value: f64) -> Self {
            Self {
                value,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<FeatureVector> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl RegressionModel for FixedModel {
        fn predict(&self, features: &FeatureVector) -> Result<f64> {
            self.seen.lock().unwrap().push(*features);
            Ok(self.value)
        }

        fn version(&self) -> &str {
            "test"
        }
    }

    struct FailingModel;

    impl RegressionModel for FailingModel {
        fn predict(&self, _features: &FeatureVector) -> Result<f64> {
            Err(PredictionError::Inference {
                model: ModelKind::Disruption,
                reason: "tensor shape mismatch".to_string(),
            })
        }

        fn version(&self) -> &str {
            "broken"
        }
    }

    fn predictor_with(
        delay: Arc<FixedModel>,
        disruption: Arc<FixedModel>,
        occupancy: Arc<FixedModel>,
    ) -> Predictor {
        Predictor::new(
            ModelSet::from_models(&test_schema(), delay, disruption, occupancy).unwrap(),
        )
    }

    fn example_models() -> (Arc<FixedModel>, Arc<FixedModel>, Arc<FixedModel>) {
        (
            Arc::new(FixedModel::new(3.456)),
            Arc::new(FixedModel::new(0.812)),
            Arc::new(FixedModel::new(0.55)),
        )
    }

    #[test]
    fn test_reference_example() {
        let (delay, disruption, occupancy) = example_models();
        let predictor = predictor_with(delay, disruption, occupancy);

        let result = predictor.predict(&test_observation()).unwrap();
        assert_eq!(result.train_id, "T1");
        assert_eq!(result.predicted_delay_min, 3.46);
        assert_eq!(result.predicted_disruption_chance, 0.81);
        assert_eq!(result.predicted_occupancy.track1, 0.55);
        assert_eq!(result.predicted_occupancy.track2, 0.55);
        assert_eq!(result.constraints.len(), 4);
        assert_eq!(result.constraints[2], "Minimize delay (predicted: 3.46 min)");
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let (delay, disruption, occupancy) = example_models();
        let predictor = predictor_with(delay, disruption, occupancy);
        let obs = test_observation();

        let first = predictor.predict(&obs).unwrap();
        let second = predictor.predict(&obs).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_all_models_see_same_features() {
        let (delay, disruption, occupancy) = example_models();
        let predictor = predictor_with(delay.clone(), disruption.clone(), occupancy.clone());

        predictor.predict(&test_observation()).unwrap();

        let seen = delay.calls();
        assert_eq!(seen.len(), 1);
        assert_eq!(disruption.calls(), seen);
        assert_eq!(occupancy.calls(), seen);
        assert_eq!(
            seen[0].to_array(),
            [0.0, 1.0, 600.0, 650.0, 120.0, 0.0, 1.0, 0.3, 2.0, 0.4]
        );
    }

    #[test]
    fn test_missing_field_fails_before_inference() {
        let (delay, disruption, occupancy) = example_models();
        let predictor = predictor_with(delay.clone(), disruption.clone(), occupancy.clone());

        let mut record = ObservationRecord::from(test_observation());
        record.speed_kmh = None;

        assert_eq!(
            predictor.predict_record(record).unwrap_err(),
            PredictionError::MissingField("speed_kmh")
        );
        assert!(delay.calls().is_empty());
        assert!(disruption.calls().is_empty());
        assert!(occupancy.calls().is_empty());
    }

    #[test]
    fn test_unavailable_model_blocks_all_inference() {
        let delay = Arc::new(FixedModel::new(1.0));
        let disruption = Arc::new(FixedModel::new(0.2));
        let set = ModelSet::from_slots(
            &test_schema(),
            ModelSlot::ready(delay.clone()),
            ModelSlot::ready(disruption.clone()),
            ModelSlot::unavailable("failed to read rf_occupancy_model.onnx"),
        )
        .unwrap();
        let predictor = Predictor::new(set);

        let err = predictor.predict(&test_observation()).unwrap_err();
        assert_eq!(
            err,
            PredictionError::ModelUnavailable {
                model: ModelKind::Occupancy,
                reason: "failed to read rf_occupancy_model.onnx".to_string()
            }
        );
        assert!(delay.calls().is_empty());
        assert!(disruption.calls().is_empty());
    }

    #[test]
    fn test_unknown_category_fails_before_inference() {
        let (delay, disruption, occupancy) = example_models();
        let predictor = predictor_with(delay.clone(), disruption, occupancy);

        let mut obs = test_observation();
        obs.direction = "E".to_string();

        assert!(matches!(
            predictor.predict(&obs),
            Err(PredictionError::UnknownCategory { field: "direction", .. })
        ));
        assert!(delay.calls().is_empty());
    }

    #[test]
    fn test_inference_failure_returns_no_result() {
        let delay = Arc::new(FixedModel::new(1.0));
        let occupancy = Arc::new(FixedModel::new(0.3));
        let set = ModelSet::from_models(
            &test_schema(),
            delay.clone(),
            Arc::new(FailingModel),
            occupancy.clone(),
        )
        .unwrap();

        let err = Predictor::new(set).predict(&test_observation()).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::Inference {
                model: ModelKind::Disruption,
                ..
            }
        ));
        assert_eq!(delay.calls().len(), 1);
        // Occupancy never runs once disruption has failed
        assert!(occupancy.calls().is_empty());
    }

    #[test]
    fn test_non_finite_output_rejected() {
        let predictor = predictor_with(
            Arc::new(FixedModel::new(f64::NAN)),
            Arc::new(FixedModel::new(0.1)),
            Arc::new(FixedModel::new(0.1)),
        );

        let err = predictor.predict(&test_observation()).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::Inference {
                model: ModelKind::Delay,
                ..
            }
        ));
    }

    #[test]
    fn test_encode_without_schema_reports_bundle_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let predictor = Predictor::load(dir.path(), &LoadConfig::default());

        match predictor.encode(&test_observation()) {
            Err(PredictionError::ModelUnavailable { reason, .. }) => {
                assert!(reason.starts_with("failed to read"));
                assert!(reason.contains(MANIFEST_FILE));
            }
            other => panic!("expected ModelUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_rejection_is_reported_on_encode() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"schema": {"features": ["type"], "categories": {}}, "models": {}}"#,
        )
        .unwrap();
        let predictor = Predictor::load(dir.path(), &LoadConfig::default());

        let err = predictor.encode(&test_observation()).unwrap_err();
        assert!(err.to_string().contains("schema mismatch"));
    }

    #[test]
    fn test_model_kind_labels() {
        assert_eq!(ModelKind::Delay.to_string(), "delay");
        assert_eq!(
            serde_json::to_string(&ModelKind::Occupancy).unwrap(),
            "\"occupancy\""
        );
    }
}
