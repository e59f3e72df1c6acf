//! Monitoring core
//!
//! This module provides:
//! - The drift orchestrator that turns one window of traffic into a report
//! - Alert derivation and push delivery
//! - The cycle scheduler with per-step failure isolation and graceful shutdown

mod alerts;
mod orchestrator;
mod report;
mod scheduler;

pub use alerts::{
    alerts_from, Alert, AlertNotifier, AlertSeverity, AlertType, ChannelNotifier, LogNotifier,
};
pub use orchestrator::DriftOrchestrator;
pub use report::{HealthStatus, MonitoringReport, OverallStatus};
pub use scheduler::{
    CycleStep, MonitoringCycleOutcome, MonitoringScheduler, SchedulerHandle, StepFailure,
    WORKER_COMPONENT,
};
