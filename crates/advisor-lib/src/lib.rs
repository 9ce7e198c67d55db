//! Library for train disruption advisories
//!
//! This crate provides the core functionality for:
//! - Validating train observations
//! - Loading and schema-checking the delay, disruption and occupancy models
//! - Running inference and formatting advisory constraints
//! - Health reporting and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;

pub use error::{ArtifactError, PredictionError};
pub use health::{ComponentHealth, ComponentStatus, HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::{AdvisorMetrics, StructuredLogger};
pub use predictor::{LoadConfig, ModelKind, ModelSet, Predictor};
