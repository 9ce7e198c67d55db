//! Core data models for the train advisor

use crate::error::{PredictionError, Result};
use serde::{Deserialize, Serialize};

/// Validated description of one train at prediction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainObservation {
    pub train_id: String,
    #[serde(rename = "type")]
    pub train_type: String,
    pub priority: i64,
    /// Scheduled departure, minutes
    pub departure: i64,
    /// Scheduled arrival, minutes
    pub arrival: i64,
    pub speed_kmh: f64,
    pub direction: String,
    pub default_track: i64,
    pub route_congestion: f64,
    pub number_of_tracks: i64,
    pub current_occupancy: f64,
    pub current_occupancy_track1: f64,
    pub current_occupancy_track2: f64,
}

/// Wire form of [`TrainObservation`] where every field may be absent.
///
/// Callers hand this in from JSON; [`ObservationRecord::validate`] turns it
/// into a `TrainObservation` before anything else happens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub train_id: Option<String>,
    #[serde(rename = "type")]
    pub train_type: Option<String>,
    pub priority: Option<i64>,
    pub departure: Option<i64>,
    pub arrival: Option<i64>,
    pub speed_kmh: Option<f64>,
    pub direction: Option<String>,
    pub default_track: Option<i64>,
    pub route_congestion: Option<f64>,
    pub number_of_tracks: Option<i64>,
    pub current_occupancy: Option<f64>,
    pub current_occupancy_track1: Option<f64>,
    pub current_occupancy_track2: Option<f64>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or(PredictionError::MissingField(field))
}

impl ObservationRecord {
    /// Decode a record from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PredictionError::MalformedInput(e.to_string()))
    }

    /// Check that every field is present.
    ///
    /// Fields are checked in declaration order, so the error names the first
    /// absent one.
    pub fn validate(self) -> Result<TrainObservation> {
        Ok(TrainObservation {
            train_id: required(self.train_id, "train_id")?,
            train_type: required(self.train_type, "type")?,
            priority: required(self.priority, "priority")?,
            departure: required(self.departure, "departure")?,
            arrival: required(self.arrival, "arrival")?,
            speed_kmh: required(self.speed_kmh, "speed_kmh")?,
            direction: required(self.direction, "direction")?,
            default_track: required(self.default_track, "default_track")?,
            route_congestion: required(self.route_congestion, "route_congestion")?,
            number_of_tracks: required(self.number_of_tracks, "number_of_tracks")?,
            current_occupancy: required(self.current_occupancy, "current_occupancy")?,
            current_occupancy_track1: required(
                self.current_occupancy_track1,
                "current_occupancy_track1",
            )?,
            current_occupancy_track2: required(
                self.current_occupancy_track2,
                "current_occupancy_track2",
            )?,
        })
    }
}

impl From<TrainObservation> for ObservationRecord {
    fn from(obs: TrainObservation) -> Self {
        Self {
            train_id: Some(obs.train_id),
            train_type: Some(obs.train_type),
            priority: Some(obs.priority),
            departure: Some(obs.departure),
            arrival: Some(obs.arrival),
            speed_kmh: Some(obs.speed_kmh),
            direction: Some(obs.direction),
            default_track: Some(obs.default_track),
            route_congestion: Some(obs.route_congestion),
            number_of_tracks: Some(obs.number_of_tracks),
            current_occupancy: Some(obs.current_occupancy),
            current_occupancy_track1: Some(obs.current_occupancy_track1),
            current_occupancy_track2: Some(obs.current_occupancy_track2),
        }
    }
}

/// Predicted occupancy per named track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedOccupancy {
    pub track1: f64,
    pub track2: f64,
}

/// Advisory payload handed to the downstream scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub train_id: String,
    pub predicted_delay_min: f64,
    pub predicted_disruption_chance: f64,
    pub predicted_occupancy: PredictedOccupancy,
    pub constraints: Vec<String>,
}

/// Feature vector for ML inference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub train_type: f32,
    pub priority: f32,
    pub departure: f32,
    pub arrival: f32,
    pub speed_kmh: f32,
    pub direction: f32,
    pub default_track: f32,
    pub route_congestion: f32,
    pub number_of_tracks: f32,
    pub current_occupancy: f32,
}

impl FeatureVector {
    /// Values in model input order
    pub fn to_array(&self) -> [f32; 10] {
        [
            self.train_type,
            self.priority,
            self.departure,
            self.arrival,
            self.speed_kmh,
            self.direction,
            self.default_track,
            self.route_congestion,
            self.number_of_tracks,
            self.current_occupancy,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RECORD: &str = r#"{
        "train_id": "T1", "type": "express", "priority": 1,
        "departure": 600, "arrival": 650, "speed_kmh": 120,
        "direction": "N", "default_track": 1, "route_congestion": 0.3,
        "number_of_tracks": 2, "current_occupancy": 0.4,
        "current_occupancy_track1": 0.2, "current_occupancy_track2": 0.6
    }"#;

    #[test]
    fn test_full_record_validates() {
        let obs = ObservationRecord::from_json(FULL_RECORD)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(obs.train_id, "T1");
        assert_eq!(obs.train_type, "express");
        assert_eq!(obs.speed_kmh, 120.0);
        assert_eq!(obs.current_occupancy_track2, 0.6);
    }

    #[test]
    fn test_missing_field_is_reported_by_name() {
        let mut value: serde_json::Value = serde_json::from_str(FULL_RECORD).unwrap();
        value.as_object_mut().unwrap().remove("speed_kmh");
        let record: ObservationRecord = serde_json::from_value(value).unwrap();

        assert_eq!(
            record.validate().unwrap_err(),
            PredictionError::MissingField("speed_kmh")
        );
    }

    #[test]
    fn test_null_counts_as_missing() {
        let mut value: serde_json::Value = serde_json::from_str(FULL_RECORD).unwrap();
        value["direction"] = serde_json::Value::Null;
        let record: ObservationRecord = serde_json::from_value(value).unwrap();

        assert_eq!(
            record.validate().unwrap_err(),
            PredictionError::MissingField("direction")
        );
    }

    #[test]
    fn test_first_missing_field_wins() {
        let record = ObservationRecord {
            train_id: Some("T9".to_string()),
            ..Default::default()
        };
        assert_eq!(
            record.validate().unwrap_err(),
            PredictionError::MissingField("type")
        );
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let err = ObservationRecord::from_json(r#"{"train_id": "T1", "priority": "high"}"#)
            .unwrap_err();
        assert!(matches!(err, PredictionError::MalformedInput(_)));
    }

    #[test]
    fn test_result_serializes_with_wire_names() {
        let result = PredictionResult {
            train_id: "T1".to_string(),
            predicted_delay_min: 3.46,
            predicted_disruption_chance: 0.81,
            predicted_occupancy: PredictedOccupancy {
                track1: 0.55,
                track2: 0.55,
            },
            constraints: vec![],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["predicted_delay_min"], 3.46);
        assert_eq!(json["predicted_occupancy"]["track2"], 0.55);
        assert!(json["constraints"].is_array());
    }
}
