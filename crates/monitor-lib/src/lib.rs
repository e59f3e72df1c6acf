//! Model drift monitoring library
//!
//! This crate provides the core functionality for:
//! - PSI and KS drift statistics and drift classification
//! - Classification performance against delayed ground truth
//! - The drift orchestrator and the monitoring cycle scheduler
//! - Prediction stores and baseline sources
//! - Health checks and observability

pub mod config;
pub mod drift;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod performance;
pub mod schema;
pub mod store;
pub mod system;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use monitor::{
    DriftOrchestrator, HealthStatus, MonitoringCycleOutcome, MonitoringReport,
    MonitoringScheduler, SchedulerHandle,
};
pub use observability::{MonitorMetrics, StructuredLogger};
pub use schema::{FeatureSchema, FeatureSet, Sample};
