//! Model artifact loading
//!
//! A model directory holds a `manifest.json` describing the shared feature
//! schema and one ONNX file per model:
//! - Schema is checked against the encoder's column order before any model
//!   is accepted
//! - Optional SHA-256 checksums are verified before parsing
//! - A model that fails to load leaves its slot unavailable instead of
//!   aborting startup

use super::features::{FeatureEncoder, FeatureSchema};
use super::inference::{OnnxRegressor, RegressionModel};
use super::ModelKind;
use crate::error::{ArtifactError, PredictionError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Manifest file name inside a model directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Default maximum size of a single model file (64MB)
pub const DEFAULT_MAX_MODEL_BYTES: u64 = 64 * 1024 * 1024;

/// Bundle manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub schema: FeatureSchema,
    pub models: BTreeMap<String, ModelEntry>,
}

/// One model file listed in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub file: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl BundleManifest {
    pub fn read(dir: &Path) -> Result<Self, ArtifactError> {
        let path = dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn entry(&self, kind: ModelKind) -> Option<&ModelEntry> {
        self.models.get(kind.as_str())
    }
}

/// Configuration for artifact loading
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Files larger than this are rejected without being parsed
    pub max_model_bytes: u64,
    /// Verify `sha256` entries when the manifest provides them
    pub verify_checksums: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_model_bytes: DEFAULT_MAX_MODEL_BYTES,
            verify_checksums: true,
        }
    }
}

/// Where a loaded model came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

/// A model position that is either loaded or known to be broken
#[derive(Clone)]
pub enum ModelSlot {
    Ready {
        model: Arc<dyn RegressionModel>,
        source: Option<ArtifactInfo>,
    },
    Unavailable {
        reason: String,
    },
}

impl ModelSlot {
    /// Wrap an already-constructed model
    pub fn ready(model: Arc<dyn RegressionModel>) -> Self {
        ModelSlot::Ready {
            model,
            source: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        ModelSlot::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelSlot::Ready { .. })
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            ModelSlot::Ready { model, .. } => Some(model.version()),
            ModelSlot::Unavailable { .. } => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            ModelSlot::Ready { .. } => None,
            ModelSlot::Unavailable { reason } => Some(reason),
        }
    }

    pub fn source(&self) -> Option<&ArtifactInfo> {
        match self {
            ModelSlot::Ready { source, .. } => source.as_ref(),
            ModelSlot::Unavailable { .. } => None,
        }
    }
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSlot::Ready { model, source } => f
                .debug_struct("Ready")
                .field("version", &model.version())
                .field("source", source)
                .finish(),
            ModelSlot::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Borrowed view of a fully loaded model set
pub(crate) struct ReadyModels<'a> {
    pub encoder: &'a FeatureEncoder,
    pub delay: &'a dyn RegressionModel,
    pub disruption: &'a dyn RegressionModel,
    pub occupancy: &'a dyn RegressionModel,
}

/// The three models plus the encoder their shared schema implies.
///
/// Built once at process start and never modified afterwards.
#[derive(Debug, Clone)]
pub struct ModelSet {
    encoder: Option<FeatureEncoder>,
    delay: ModelSlot,
    disruption: ModelSlot,
    occupancy: ModelSlot,
}

impl ModelSet {
    /// Assemble a set from pre-built slots
    pub fn from_slots(
        schema: &FeatureSchema,
        delay: ModelSlot,
        disruption: ModelSlot,
        occupancy: ModelSlot,
    ) -> Result<Self, ArtifactError> {
        Ok(Self {
            encoder: Some(FeatureEncoder::from_schema(schema)?),
            delay,
            disruption,
            occupancy,
        })
    }

    /// Assemble a set from three ready models
    pub fn from_models(
        schema: &FeatureSchema,
        delay: Arc<dyn RegressionModel>,
        disruption: Arc<dyn RegressionModel>,
        occupancy: Arc<dyn RegressionModel>,
    ) -> Result<Self, ArtifactError> {
        Self::from_slots(
            schema,
            ModelSlot::ready(delay),
            ModelSlot::ready(disruption),
            ModelSlot::ready(occupancy),
        )
    }

    /// A set where every slot carries the same failure
    fn all_unavailable(reason: &str) -> Self {
        Self {
            encoder: None,
            delay: ModelSlot::unavailable(reason),
            disruption: ModelSlot::unavailable(reason),
            occupancy: ModelSlot::unavailable(reason),
        }
    }

    /// Load the bundle in `dir`.
    ///
    /// Never fails: problems are recorded on the affected slots and surface
    /// as `ModelUnavailable` when a prediction is attempted.
    pub fn load(dir: &Path, config: &LoadConfig) -> Self {
        info!(dir = %dir.display(), "Loading model bundle");

        let manifest = match BundleManifest::read(dir) {
            Ok(m) => m,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Model bundle manifest unusable");
                return Self::all_unavailable(&e.to_string());
            }
        };

        let encoder = match FeatureEncoder::from_schema(&manifest.schema) {
            Ok(enc) => enc,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Model bundle schema rejected");
                return Self::all_unavailable(&e.to_string());
            }
        };

        let load = |kind: ModelKind| match load_slot(dir, kind, manifest.entry(kind), config) {
            Ok((model, source)) => {
                info!(
                    model = %kind,
                    version = %model.version(),
                    path = %source.path.display(),
                    size = source.size_bytes,
                    "Model loaded"
                );
                ModelSlot::Ready {
                    model,
                    source: Some(source),
                }
            }
            Err(e) => {
                warn!(model = %kind, error = %e, "Model unavailable");
                ModelSlot::unavailable(e.to_string())
            }
        };

        Self {
            encoder: Some(encoder),
            delay: load(ModelKind::Delay),
            disruption: load(ModelKind::Disruption),
            occupancy: load(ModelKind::Occupancy),
        }
    }

    pub fn slot(&self, kind: ModelKind) -> &ModelSlot {
        match kind {
            ModelKind::Delay => &self.delay,
            ModelKind::Disruption => &self.disruption,
            ModelKind::Occupancy => &self.occupancy,
        }
    }

    /// Encoder for the bundle schema.
    ///
    /// A bundle without a usable schema has every slot unavailable with the
    /// same reason, so the first slot's failure is reported.
    pub fn encoder(&self) -> Result<&FeatureEncoder> {
        match &self.encoder {
            Some(encoder) => Ok(encoder),
            None => Err(self.first_unavailable().unwrap_or_else(|| {
                PredictionError::ModelUnavailable {
                    model: ModelKind::Delay,
                    reason: "feature schema not loaded".to_string(),
                }
            })),
        }
    }

    pub fn all_ready(&self) -> bool {
        ModelKind::ALL.iter().all(|k| self.slot(*k).is_ready())
    }

    /// Fail with the first unavailable model, if any
    pub fn ensure_ready(&self) -> Result<()> {
        match self.first_unavailable() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn first_unavailable(&self) -> Option<PredictionError> {
        ModelKind::ALL.iter().find_map(|&kind| {
            self.slot(kind)
                .unavailable_reason()
                .map(|reason| PredictionError::ModelUnavailable {
                    model: kind,
                    reason: reason.to_string(),
                })
        })
    }

    pub(crate) fn ready(&self) -> Result<ReadyModels<'_>> {
        let get = |kind: ModelKind| match self.slot(kind) {
            ModelSlot::Ready { model, .. } => Ok(model.as_ref()),
            ModelSlot::Unavailable { reason } => Err(PredictionError::ModelUnavailable {
                model: kind,
                reason: reason.clone(),
            }),
        };

        let delay = get(ModelKind::Delay)?;
        let disruption = get(ModelKind::Disruption)?;
        let occupancy = get(ModelKind::Occupancy)?;
        let encoder = self.encoder()?;

        Ok(ReadyModels {
            encoder,
            delay,
            disruption,
            occupancy,
        })
    }
}

fn load_slot(
    dir: &Path,
    kind: ModelKind,
    entry: Option<&ModelEntry>,
    config: &LoadConfig,
) -> Result<(Arc<dyn RegressionModel>, ArtifactInfo), ArtifactError> {
    let entry = entry.ok_or(ArtifactError::MissingEntry(kind))?;
    let path = dir.join(&entry.file);
    let io_err = |source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    };

    let size = fs::metadata(&path).map_err(io_err)?.len();
    if size > config.max_model_bytes {
        return Err(ArtifactError::TooLarge {
            size,
            limit: config.max_model_bytes,
        });
    }

    let bytes = fs::read(&path).map_err(io_err)?;
    let checksum = compute_checksum(&bytes);
    if config.verify_checksums {
        if let Some(expected) = &entry.sha256 {
            if !expected.eq_ignore_ascii_case(&checksum) {
                return Err(ArtifactError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: checksum,
                });
            }
        }
    }

    let model = OnnxRegressor::from_bytes(kind, entry.version.clone(), &bytes)?;
    Ok((
        Arc::new(model),
        ArtifactInfo {
            path,
            size_bytes: bytes.len() as u64,
            sha256: checksum,
        },
    ))
}

/// Compute SHA256 checksum of model bytes
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
