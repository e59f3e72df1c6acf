//! Observability for the drift monitor
//!
//! Provides:
//! - Prometheus metrics (cycle latency, cycle and step failures, drift gauges, worker usage)
//! - Event-named structured logging with tracing

use crate::health::ComponentStatus;
use crate::monitor::{Alert, AlertSeverity, MonitoringCycleOutcome, MonitoringReport};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Buckets for cycle durations (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    cycle_duration_seconds: Histogram,
    cycles_total: IntCounter,
    cycles_failed: IntCounter,
    step_failures: IntCounterVec,
    reports_generated: IntCounter,
    alerts_raised: IntCounterVec,
    persistence_failures: IntCounterVec,
    features_drifted: IntGauge,
    max_psi: Gauge,
    model_health: IntGauge,
    worker_cpu_percent: Gauge,
    worker_memory_bytes: IntGauge,
    worker_status: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "drift_monitor_cycle_duration_seconds",
                "Wall time of one monitoring cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycles_total: register_int_counter!(
                "drift_monitor_cycles_total",
                "Monitoring cycles executed"
            )
            .expect("Failed to register cycles_total"),

            cycles_failed: register_int_counter!(
                "drift_monitor_cycles_failed_total",
                "Monitoring cycles with at least one failed step"
            )
            .expect("Failed to register cycles_failed"),

            step_failures: register_int_counter_vec!(
                "drift_monitor_step_failures_total",
                "Failed cycle steps by step name",
                &["step"]
            )
            .expect("Failed to register step_failures"),

            reports_generated: register_int_counter!(
                "drift_monitor_reports_generated_total",
                "Drift reports produced by the orchestrator"
            )
            .expect("Failed to register reports_generated"),

            alerts_raised: register_int_counter_vec!(
                "drift_monitor_alerts_raised_total",
                "Drift alerts raised by severity",
                &["severity"]
            )
            .expect("Failed to register alerts_raised"),

            persistence_failures: register_int_counter_vec!(
                "drift_monitor_persistence_failures_total",
                "Failed writes to the monitoring store by record kind",
                &["kind"]
            )
            .expect("Failed to register persistence_failures"),

            features_drifted: register_int_gauge!(
                "drift_monitor_features_drifted",
                "Features flagged as drifted in the latest report"
            )
            .expect("Failed to register features_drifted"),

            max_psi: register_gauge!(
                "drift_monitor_max_psi",
                "Largest feature PSI in the latest report"
            )
            .expect("Failed to register max_psi"),

            model_health: register_int_gauge!(
                "drift_monitor_model_health",
                "Overall model health of the latest report (-1 unknown, 0 healthy, 1 warning, 2 critical)"
            )
            .expect("Failed to register model_health"),

            worker_cpu_percent: register_gauge!(
                "drift_monitor_worker_cpu_percent",
                "CPU usage of the monitoring worker process"
            )
            .expect("Failed to register worker_cpu_percent"),

            worker_memory_bytes: register_int_gauge!(
                "drift_monitor_worker_memory_bytes",
                "Resident memory of the monitoring worker process"
            )
            .expect("Failed to register worker_memory_bytes"),

            worker_status: register_int_gauge!(
                "drift_monitor_worker_status",
                "Overall worker health (2 healthy, 1 degraded, 0 unhealthy)"
            )
            .expect("Failed to register worker_status"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn record_cycle(&self, outcome: &MonitoringCycleOutcome) {
        let inner = self.inner();
        inner
            .cycle_duration_seconds
            .observe(outcome.duration.as_secs_f64());
        inner.cycles_total.inc();
        if !outcome.success {
            inner.cycles_failed.inc();
        }
        for failure in &outcome.failures {
            inner
                .step_failures
                .with_label_values(&[failure.step.as_str()])
                .inc();
        }
    }

    /// Refresh drift gauges from a freshly built report
    pub fn record_report(&self, report: &MonitoringReport) {
        let inner = self.inner();
        inner.reports_generated.inc();
        inner
            .features_drifted
            .set(report.drifted_feature_count() as i64);
        inner.max_psi.set(report.max_psi().unwrap_or(0.0));
        inner.model_health.set(report.overall_status.health.as_gauge());

        for alert in &report.alerts {
            let severity = alert.severity.to_string();
            inner
                .alerts_raised
                .with_label_values(&[severity.as_str()])
                .inc();
        }
    }

    pub fn inc_persistence_failure(&self, kind: &str) {
        self.inner()
            .persistence_failures
            .with_label_values(&[kind])
            .inc();
    }

    pub fn set_worker_usage(&self, cpu_percent: f64, memory_bytes: u64) {
        self.inner().worker_cpu_percent.set(cpu_percent);
        self.inner()
            .worker_memory_bytes
            .set(i64::try_from(memory_bytes).unwrap_or(i64::MAX));
    }

    pub fn set_worker_status(&self, status: ComponentStatus) {
        self.inner().worker_status.set(status.as_gauge());
    }
}

/// Structured logger for monitoring events
#[derive(Clone)]
pub struct StructuredLogger {
    worker_id: String,
}

impl StructuredLogger {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn log_startup(&self, version: &str, model_version: &str, interval_secs: u64) {
        info!(
            event = "worker_started",
            worker = %self.worker_id,
            worker_version = %version,
            model_version = %model_version,
            interval_secs = interval_secs,
            "Drift monitoring worker started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "worker_shutdown",
            worker = %self.worker_id,
            reason = %reason,
            "Drift monitoring worker shutting down"
        );
    }

    pub fn log_cycle_completed(&self, outcome: &MonitoringCycleOutcome) {
        if outcome.success {
            info!(
                event = "cycle_completed",
                worker = %self.worker_id,
                cycle = outcome.cycle,
                duration_ms = outcome.duration.as_millis() as u64,
                "Monitoring cycle completed"
            );
        } else {
            let failed: Vec<&str> = outcome.failures.iter().map(|f| f.step.as_str()).collect();
            warn!(
                event = "cycle_completed",
                worker = %self.worker_id,
                cycle = outcome.cycle,
                duration_ms = outcome.duration.as_millis() as u64,
                failed_steps = ?failed,
                error = outcome.error.as_deref().unwrap_or(""),
                "Monitoring cycle completed with failures"
            );
        }
    }

    pub fn log_drift_report(&self, report: &MonitoringReport) {
        let status = &report.overall_status;
        let drifted = report.drifted_feature_count();
        if status.health.is_alerting() {
            warn!(
                event = "drift_report",
                worker = %self.worker_id,
                window = %report.window,
                health = %status.health,
                total_predictions = report.total_predictions,
                features_drifted = drifted,
                concept_drift = status.concept_drift_detected,
                performance_degraded = status.performance_degraded,
                synthetic_baseline = report.baseline_is_synthetic,
                "Model drift detected"
            );
        } else {
            info!(
                event = "drift_report",
                worker = %self.worker_id,
                window = %report.window,
                health = %status.health,
                total_predictions = report.total_predictions,
                features_drifted = drifted,
                synthetic_baseline = report.baseline_is_synthetic,
                "Drift report generated"
            );
        }
    }

    pub fn log_alert(&self, alert: &Alert) {
        match alert.severity {
            AlertSeverity::High => warn!(
                event = "alert_raised",
                worker = %self.worker_id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                feature = alert.feature_name.as_deref().unwrap_or(""),
                message = %alert.message,
                "High severity drift alert"
            ),
            _ => info!(
                event = "alert_raised",
                worker = %self.worker_id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                feature = alert.feature_name.as_deref().unwrap_or(""),
                message = %alert.message,
                "Drift alert"
            ),
        }
    }

    pub fn log_persistence_failed(&self, kind: &str, error: &dyn std::fmt::Display) {
        error!(
            event = "persistence_failed",
            worker = %self.worker_id,
            kind = %kind,
            error = %error,
            "Failed to persist monitoring record"
        );
    }

    pub fn log_baseline_fallback(&self, samples: usize, seed: u64) {
        warn!(
            event = "baseline_fallback",
            worker = %self.worker_id,
            samples = samples,
            seed = seed,
            "No persisted baseline, using synthetic reference data"
        );
    }
}
