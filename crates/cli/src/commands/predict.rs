//! Prediction and feature-encoding commands

use anyhow::{Context, Result};
use advisor_lib::predictor::{format_number, FEATURE_NAMES};
use advisor_lib::{LoadConfig, ObservationRecord, PredictionResult, Predictor, TrainObservation};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;
use tracing::debug;

use super::read_input;
use crate::output::{color_level, print_info, print_json, print_table, OutputFormat};

/// Row for the prediction summary table
#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Row for the constraints table
#[derive(Tabled)]
struct ConstraintRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Constraint")]
    constraint: String,
}

/// Row for the feature vector table
#[derive(Tabled, Serialize)]
struct FeatureRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Feature")]
    feature: &'static str,
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Encoded")]
    encoded: f32,
}

/// Parse and validate an observation before any model is loaded
fn read_observation(input: Option<&Path>) -> Result<TrainObservation> {
    let json = read_input(input)?;
    let record = ObservationRecord::from_json(&json)?;
    Ok(record.validate()?)
}

/// Run all three models on one observation and print the advisory
pub fn run_prediction(
    models_dir: &Path,
    load_config: &LoadConfig,
    input: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let obs = read_observation(input)?;
    debug!(train_id = %obs.train_id, "Observation validated");

    let predictor = Predictor::load(models_dir, load_config);
    let result = predictor
        .predict(&obs)
        .with_context(|| format!("Prediction failed for train {}", obs.train_id))?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_prediction(&result),
    }
    Ok(())
}

fn print_prediction(result: &PredictionResult) {
    println!("{} {}", "Train".bold(), result.train_id.cyan());

    print_table(vec![
        FieldRow {
            field: "Predicted delay (min)".to_string(),
            value: format_number(result.predicted_delay_min),
        },
        FieldRow {
            field: "Disruption chance".to_string(),
            value: color_level(result.predicted_disruption_chance),
        },
        FieldRow {
            field: "Occupancy track1".to_string(),
            value: color_level(result.predicted_occupancy.track1),
        },
        FieldRow {
            field: "Occupancy track2".to_string(),
            value: color_level(result.predicted_occupancy.track2),
        },
    ]);

    println!("\n{}", "Constraints".bold());
    print_table(
        result
            .constraints
            .iter()
            .enumerate()
            .map(|(i, c)| ConstraintRow {
                index: i + 1,
                constraint: c.clone(),
            })
            .collect(),
    );
}

/// Print the feature vector the models would receive
pub fn show_features(
    models_dir: &Path,
    load_config: &LoadConfig,
    input: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let obs = read_observation(input)?;
    let predictor = Predictor::load(models_dir, load_config);
    let features = predictor
        .encode(&obs)
        .context("Failed to encode observation")?;

    let rows: Vec<FeatureRow> = FEATURE_NAMES
        .iter()
        .zip(raw_inputs(&obs))
        .zip(features.to_array())
        .enumerate()
        .map(|(i, ((name, input), encoded))| FeatureRow {
            index: i,
            feature: *name,
            input,
            encoded,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => {
            print_info(&format!("Feature vector for train {}", obs.train_id));
            print_table(rows);
        }
    }
    Ok(())
}

/// Observation values in model column order, as the user supplied them
fn raw_inputs(obs: &TrainObservation) -> [String; 10] {
    [
        obs.train_type.clone(),
        obs.priority.to_string(),
        obs.departure.to_string(),
        obs.arrival.to_string(),
        format_number(obs.speed_kmh),
        obs.direction.clone(),
        obs.default_track.to_string(),
        format_number(obs.route_congestion),
        obs.number_of_tracks.to_string(),
        format_number(obs.current_occupancy),
    ]
}
