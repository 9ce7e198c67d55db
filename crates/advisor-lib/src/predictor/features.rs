//! Feature encoding for ML inference
//!
//! Turns a validated observation into the fixed-order vector all three
//! models were trained on. Numeric fields are cast directly; the two
//! categorical fields are ordinal-encoded against the vocabularies shipped
//! with the model bundle.

use crate::error::{ArtifactError, PredictionError, Result};
use crate::models::{FeatureVector, TrainObservation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of input features expected by every model
pub const NUM_FEATURES: usize = 10;

/// Model input columns, in order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "type",
    "priority",
    "departure",
    "arrival",
    "speed_kmh",
    "direction",
    "default_track",
    "route_congestion",
    "number_of_tracks",
    "current_occupancy",
];

/// Columns that carry categorical values
pub const CATEGORICAL_FEATURES: [&str; 2] = ["type", "direction"];

/// Feature contract declared by a model bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub features: Vec<String>,
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
}

impl FeatureSchema {
    /// Verify the declared columns match what the encoder produces
    pub fn check(&self) -> Result<(), ArtifactError> {
        if self.features.len() != NUM_FEATURES
            || self.features.iter().zip(FEATURE_NAMES).any(|(a, b)| a != b)
        {
            return Err(ArtifactError::SchemaMismatch(format!(
                "expected features [{}], manifest declares [{}]",
                FEATURE_NAMES.join(", "),
                self.features.join(", ")
            )));
        }

        for field in CATEGORICAL_FEATURES {
            match self.categories.get(field) {
                Some(values) if !values.is_empty() => {}
                _ => {
                    return Err(ArtifactError::SchemaMismatch(format!(
                        "no vocabulary for categorical feature '{}'",
                        field
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Encodes observations into feature vectors
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    train_types: Vec<String>,
    directions: Vec<String>,
}

impl FeatureEncoder {
    /// Build an encoder from a checked schema
    pub fn from_schema(schema: &FeatureSchema) -> Result<Self, ArtifactError> {
        schema.check()?;
        Ok(Self {
            train_types: schema.categories["type"].clone(),
            directions: schema.categories["direction"].clone(),
        })
    }

    pub fn encode(&self, obs: &TrainObservation) -> Result<FeatureVector> {
        Ok(FeatureVector {
            train_type: ordinal(&self.train_types, "type", &obs.train_type)?,
            priority: obs.priority as f32,
            departure: obs.departure as f32,
            arrival: obs.arrival as f32,
            speed_kmh: obs.speed_kmh as f32,
            direction: ordinal(&self.directions, "direction", &obs.direction)?,
            default_track: obs.default_track as f32,
            route_congestion: obs.route_congestion as f32,
            number_of_tracks: obs.number_of_tracks as f32,
            current_occupancy: obs.current_occupancy as f32,
        })
    }
}

fn ordinal(vocabulary: &[String], field: &'static str, value: &str) -> Result<f32> {
    vocabulary
        .iter()
        .position(|v| v == value)
        .map(|idx| idx as f32)
        .ok_or_else(|| PredictionError::UnknownCategory {
            field,
            value: value.to_string(),
        })
}
