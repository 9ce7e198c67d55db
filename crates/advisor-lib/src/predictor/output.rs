//! Prediction output formatting
//!
//! Rounds raw model outputs and renders the advisory constraint strings
//! consumed by the downstream scheduler.

use crate::models::{PredictedOccupancy, PredictionResult, TrainObservation};

/// Decimal places kept on every predicted value
pub const PREDICTION_DECIMALS: i32 = 2;

/// Occupancy level quoted in the track advisories.
///
/// Only ever rendered into text; nothing compares against it.
pub const OCCUPANCY_ADVISORY_THRESHOLD: f64 = 0.5;

/// Raw (unrounded) outputs of the three models
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPredictions {
    pub delay_min: f64,
    pub disruption_chance: f64,
    pub occupancy: f64,
}

/// Formats raw model outputs into a PredictionResult
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(&self, obs: &TrainObservation, raw: RawPredictions) -> PredictionResult {
        let delay = round_to(raw.delay_min, PREDICTION_DECIMALS);
        let disruption = round_to(raw.disruption_chance, PREDICTION_DECIMALS);
        let occupancy = round_to(raw.occupancy, PREDICTION_DECIMALS);

        let constraints = vec![
            track_advisory("track1", obs.current_occupancy_track1, occupancy),
            track_advisory("track2", obs.current_occupancy_track2, occupancy),
            format!("Minimize delay (predicted: {} min)", format_number(delay)),
            format!("Minimize disruption (predicted: {})", format_number(disruption)),
        ];

        PredictionResult {
            train_id: obs.train_id.clone(),
            predicted_delay_min: delay,
            predicted_disruption_chance: disruption,
            // Single occupancy model, so both tracks get the same value
            predicted_occupancy: PredictedOccupancy {
                track1: occupancy,
                track2: occupancy,
            },
            constraints,
        }
    }
}

fn track_advisory(track: &str, current: f64, predicted: f64) -> String {
    format!(
        "Avoid {} if occupancy > {} (current: {}, predicted: {})",
        track,
        format_number(OCCUPANCY_ADVISORY_THRESHOLD),
        format_number(current),
        format_number(predicted)
    )
}

/// Round to `decimals` places, ties to even on the scaled value
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Magnitudes outside `[1e-4, 1e16)` switch to exponent notation
const SCIENTIFIC_LOW: f64 = 1e-4;
const SCIENTIFIC_HIGH: f64 = 1e16;

/// Shortest round-trip rendering.
///
/// Integral values keep one decimal (`1.0`); very small or very large
/// magnitudes use an exponent with at least two digits (`1e-05`, `1e+16`).
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(SCIENTIFIC_LOW..SCIENTIFIC_HIGH).contains(&magnitude) {
        return scientific(value);
    }

    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn scientific(value: f64) -> String {
    let rendered = format!("{:e}", value);
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::features::tests::test_observation;

    fn raw(delay: f64, disruption: f64, occupancy: f64) -> RawPredictions {
        RawPredictions {
            delay_min: delay,
            disruption_chance: disruption,
            occupancy,
        }
    }

    #[test]
    fn test_values_rounded_to_two_places() {
        let result = OutputFormatter::new().format(&test_observation(), raw(3.456, 0.812, 0.5549));

        assert_eq!(result.predicted_delay_min, 3.46);
        assert_eq!(result.predicted_disruption_chance, 0.81);
        assert_eq!(result.predicted_occupancy.track1, 0.55);
        assert_eq!(result.predicted_occupancy.track2, 0.55);
    }

    #[test]
    fn test_constraints_fixed_order_and_text() {
        let result = OutputFormatter::new().format(&test_observation(), raw(3.456, 0.812, 0.55));

        assert_eq!(
            result.constraints,
            vec![
                "Avoid track1 if occupancy > 0.5 (current: 0.2, predicted: 0.55)".to_string(),
                "Avoid track2 if occupancy > 0.5 (current: 0.6, predicted: 0.55)".to_string(),
                "Minimize delay (predicted: 3.46 min)".to_string(),
                "Minimize disruption (predicted: 0.81)".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_threshold_logic_applied() {
        // Occupancy well below the advisory level still yields both advisories
        let result = OutputFormatter::new().format(&test_observation(), raw(0.0, 0.0, 0.01));
        assert_eq!(result.constraints.len(), 4);
        assert!(result.constraints[0].starts_with("Avoid track1"));
        assert!(result.constraints[1].starts_with("Avoid track2"));
    }

    #[test]
    fn test_integral_values_keep_one_decimal() {
        let mut obs = test_observation();
        obs.current_occupancy_track1 = 1.0;
        let result = OutputFormatter::new().format(&obs, raw(5.0, 1.0, 0.999));

        assert_eq!(
            result.constraints[0],
            "Avoid track1 if occupancy > 0.5 (current: 1.0, predicted: 1.0)"
        );
        assert_eq!(result.constraints[2], "Minimize delay (predicted: 5.0 min)");
    }

    #[test]
    fn test_exact_ties_round_to_even() {
        assert_eq!(round_to(3.125, 2), 3.12);
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(-1.236, 2), -1.24);
        assert_eq!(format_number(round_to(-2.5, 2)), "-2.5");
    }

    #[test]
    fn test_tied_outputs_flow_into_constraints() {
        let result = OutputFormatter::new().format(&test_observation(), raw(3.125, 0.125, 0.375));

        assert_eq!(result.predicted_delay_min, 3.12);
        assert_eq!(result.predicted_disruption_chance, 0.12);
        assert_eq!(result.predicted_occupancy.track1, 0.38);
        assert_eq!(result.constraints[2], "Minimize delay (predicted: 3.12 min)");
        assert_eq!(result.constraints[3], "Minimize disruption (predicted: 0.12)");
    }

    #[test]
    fn test_extreme_magnitudes_use_exponent() {
        assert_eq!(format_number(0.00001), "1e-05");
        assert_eq!(format_number(-0.000015), "-1.5e-05");
        assert_eq!(format_number(0.0001), "0.0001");
        assert_eq!(format_number(1e16), "1e+16");
        assert_eq!(format_number(0.0), "0.0");
    }

    #[test]
    fn test_train_id_carried_through() {
        let mut obs = test_observation();
        obs.train_id = "IC-204".to_string();
        let result = OutputFormatter::new().format(&obs, raw(1.0, 0.1, 0.2));
        assert_eq!(result.train_id, "IC-204");
    }
}
