//! Health reporting for the advisor
//!
//! Models are loaded once and never reloaded, so health is a pure function
//! of the [`ModelSet`]: each model slot is a component, and the advisor is
//! ready only when all of them are.

use crate::predictor::{ModelKind, ModelSet, ModelSlot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Model loaded and usable
    Healthy,
    /// Model failed to load; every prediction will fail
    Unhealthy,
}

/// Information about one model's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn from_slot(slot: &ModelSlot, now: i64) -> Self {
        match slot {
            ModelSlot::Ready { model, .. } => Self {
                status: ComponentStatus::Healthy,
                version: Some(model.version().to_string()),
                message: None,
                last_check_timestamp: now,
            },
            ModelSlot::Unavailable { reason } => Self {
                status: ComponentStatus::Unhealthy,
                version: None,
                message: Some(reason.clone()),
                last_check_timestamp: now,
            },
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    pub fn from_models(models: &ModelSet) -> Self {
        let now = chrono::Utc::now().timestamp();
        let components: BTreeMap<String, ComponentHealth> = ModelKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.as_str().to_string(),
                    ComponentHealth::from_slot(models.slot(*kind), now),
                )
            })
            .collect();

        let status = if components
            .values()
            .all(|c| c.status == ComponentStatus::Healthy)
        {
            ComponentStatus::Healthy
        } else {
            ComponentStatus::Unhealthy
        };

        Self { status, components }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReadinessResponse {
    pub fn from_models(models: &ModelSet) -> Self {
        match models.ensure_ready() {
            Ok(()) => Self {
                ready: true,
                reason: None,
            },
            Err(e) => Self {
                ready: false,
                reason: Some(e.to_string()),
            },
        }
    }
}
