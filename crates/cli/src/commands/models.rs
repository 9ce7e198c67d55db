//! Model bundle inspection command

use advisor_lib::predictor::{BundleManifest, ModelKind, ModelSet, ModelSlot};
use advisor_lib::LoadConfig;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_status, format_bytes, print_error, print_json, print_success, print_table, short_digest,
    OutputFormat,
};

/// Load status of one model, as printed by `tadv models`
#[derive(Debug, Serialize)]
struct ModelStatus {
    model: ModelKind,
    file: Option<String>,
    version: Option<String>,
    status: &'static str,
    size_bytes: Option<u64>,
    sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Row for models table
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "SHA-256")]
    sha256: String,
}

fn collect_statuses(models_dir: &Path, models: &ModelSet) -> Vec<ModelStatus> {
    // Manifest may be unreadable; the load failure is already on every slot
    let manifest = BundleManifest::read(models_dir).ok();

    ModelKind::ALL
        .iter()
        .map(|kind| {
            let entry = manifest.as_ref().and_then(|m| m.entry(*kind));
            let slot = models.slot(*kind);
            let source = slot.source();
            ModelStatus {
                model: *kind,
                file: entry.map(|e| e.file.clone()),
                version: entry.map(|e| e.version.clone()),
                status: match slot {
                    ModelSlot::Ready { .. } => "ready",
                    ModelSlot::Unavailable { .. } => "unavailable",
                },
                size_bytes: source.map(|s| s.size_bytes),
                sha256: source.map(|s| s.sha256.clone()),
                reason: slot.unavailable_reason().map(str::to_string),
            }
        })
        .collect()
}

/// Load the bundle and report each model's status
pub fn show_models(models_dir: &Path, load_config: &LoadConfig, format: OutputFormat) -> Result<()> {
    let models = ModelSet::load(models_dir, load_config);
    let statuses = collect_statuses(models_dir, &models);

    match format {
        OutputFormat::Json => print_json(&statuses)?,
        OutputFormat::Table => {
            let dash = || "-".to_string();
            let rows: Vec<ModelRow> = statuses
                .iter()
                .map(|s| ModelRow {
                    model: s.model.to_string(),
                    file: s.file.clone().unwrap_or_else(dash),
                    version: s.version.clone().unwrap_or_else(dash),
                    status: color_status(s.status),
                    size: s.size_bytes.map(format_bytes).unwrap_or_else(dash),
                    sha256: s.sha256.as_deref().map(short_digest).unwrap_or_else(dash),
                })
                .collect();
            print_table(rows);

            for s in &statuses {
                if let Some(reason) = &s.reason {
                    print_error(&format!("{}: {}", s.model, reason));
                }
            }
            if models.all_ready() {
                print_success("All models loaded");
            }
        }
    }

    if !models.all_ready() {
        anyhow::bail!("{} is not a usable model bundle", models_dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_lib::predictor::MANIFEST_FILE;
    use tempfile::TempDir;

    #[test]
    fn test_statuses_for_missing_bundle() {
        let dir = TempDir::new().unwrap();
        let models = ModelSet::load(dir.path(), &LoadConfig::default());
        let statuses = collect_statuses(dir.path(), &models);

        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().all(|s| s.status == "unavailable"));
        assert!(statuses.iter().all(|s| s.file.is_none()));
        assert!(statuses[0].reason.as_deref().unwrap().contains(MANIFEST_FILE));
    }

    #[test]
    fn test_statuses_report_manifest_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{
                "schema": {
                    "features": ["type","priority","departure","arrival","speed_kmh",
                                 "direction","default_track","route_congestion",
                                 "number_of_tracks","current_occupancy"],
                    "categories": {"type": ["express"], "direction": ["N"]}
                },
                "models": {
                    "delay": {"file": "rf_delay_model.onnx", "version": "2.1.0"}
                }
            }"#,
        )
        .unwrap();

        let models = ModelSet::load(dir.path(), &LoadConfig::default());
        let statuses = collect_statuses(dir.path(), &models);

        assert_eq!(statuses[0].file.as_deref(), Some("rf_delay_model.onnx"));
        assert_eq!(statuses[0].version.as_deref(), Some("2.1.0"));
        assert_eq!(statuses[0].status, "unavailable");
        assert!(statuses[1].file.is_none());
        assert_eq!(
            statuses[2].reason.as_deref(),
            Some("manifest has no entry for the occupancy model")
        );
    }

    #[test]
    fn test_show_models_fails_for_unusable_bundle() {
        let dir = TempDir::new().unwrap();
        let result = show_models(dir.path(), &LoadConfig::default(), OutputFormat::Json);
        assert!(result.is_err());
    }
}
