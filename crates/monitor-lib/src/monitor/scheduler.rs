//! Monitoring cycle scheduler
//!
//! Ticks on a fixed cadence and runs one cycle per tick: a store refresh,
//! aggregate metrics, a drift check through the orchestrator, and a worker
//! health snapshot.
//! Each step is isolated and time-bounded, so a failing step never stops the
//! other steps or later cycles. Ticks missed while a cycle overruns are
//! skipped rather than queued.

use super::orchestrator::DriftOrchestrator;
use super::report::MonitoringReport;
use crate::error::{with_timeout, MonitorError, Result};
use crate::health::{components, HealthRegistry};
use crate::models::{MetricsSnapshot, TimeWindow};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::performance::evaluate_pairs;
use crate::system::ProcessProbe;
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Component name used on persisted health snapshots
pub const WORKER_COMPONENT: &str = "monitoring_worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleStep {
    Ingest,
    AggregateMetrics,
    DriftCheck,
    SystemHealth,
}

impl CycleStep {
    pub const ALL: [CycleStep; 4] = [
        CycleStep::Ingest,
        CycleStep::AggregateMetrics,
        CycleStep::DriftCheck,
        CycleStep::SystemHealth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStep::Ingest => "ingest",
            CycleStep::AggregateMetrics => "aggregate_metrics",
            CycleStep::DriftCheck => "drift_check",
            CycleStep::SystemHealth => "system_health",
        }
    }
}

impl std::fmt::Display for CycleStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step: CycleStep,
    pub error: String,
}

/// What happened in one cycle; for operational visibility only
#[derive(Debug, Clone)]
pub struct MonitoringCycleOutcome {
    pub cycle: u64,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
    pub failures: Vec<StepFailure>,
    /// Report of the drift check, when that step succeeded
    pub report: Option<MonitoringReport>,
}

impl MonitoringCycleOutcome {
    pub fn failed_step(&self, step: CycleStep) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }
}

/// Drift aggregates carried from the latest drift check into metrics snapshots
#[derive(Debug, Clone, Copy, Default)]
struct DriftAggregates {
    avg_psi: Option<f64>,
    max_psi: Option<f64>,
    avg_ks_statistic: Option<f64>,
    alerts: usize,
}

impl From<&MonitoringReport> for DriftAggregates {
    fn from(report: &MonitoringReport) -> Self {
        Self {
            avg_psi: report.avg_psi(),
            max_psi: report.max_psi(),
            avg_ks_statistic: report.avg_ks_statistic(),
            alerts: report.alerts.len(),
        }
    }
}

pub struct MonitoringScheduler {
    orchestrator: Arc<DriftOrchestrator>,
    health: HealthRegistry,
    probe: ProcessProbe,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
    interval: Duration,
    step_timeout: Duration,
    cycles: AtomicU64,
    last_drift: RwLock<Option<DriftAggregates>>,
    outcome_tx: watch::Sender<Option<MonitoringCycleOutcome>>,
}

/// Running scheduler task
pub struct SchedulerHandle {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
    outcomes: watch::Receiver<Option<MonitoringCycleOutcome>>,
}

impl SchedulerHandle {
    /// Latest cycle outcome; changes after every cycle
    pub fn outcomes(&self) -> watch::Receiver<Option<MonitoringCycleOutcome>> {
        self.outcomes.clone()
    }

    /// Signal shutdown and wait for the loop to exit.
    ///
    /// A cycle already in flight runs to completion first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Monitoring scheduler task ended abnormally");
        }
    }
}

impl MonitoringScheduler {
    pub fn new(orchestrator: Arc<DriftOrchestrator>, health: HealthRegistry) -> Self {
        let config = orchestrator.config();
        let (outcome_tx, _) = watch::channel(None);
        Self {
            interval: config.monitoring_interval(),
            step_timeout: config.step_timeout(),
            orchestrator,
            health,
            probe: ProcessProbe::new(),
            metrics: MonitorMetrics::new(),
            logger: StructuredLogger::new("drift-monitor"),
            cycles: AtomicU64::new(0),
            last_drift: RwLock::new(None),
            outcome_tx,
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<MonitoringCycleOutcome>> {
        self.outcome_tx.subscribe()
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Spawn the cycle loop with its own shutdown channel
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let outcomes = self.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle {
            shutdown,
            task,
            outcomes,
        }
    }

    /// Run cycles until `shutdown` fires or its sender is dropped
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            step_timeout_secs = self.step_timeout.as_secs(),
            "Starting monitoring scheduler"
        );

        for name in [components::SCHEDULER, components::STORE, components::BASELINE] {
            self.health.register(name).await;
        }

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    info!(cycles = self.cycles_run(), "Shutting down monitoring scheduler");
                    break;
                }
            }
        }
    }

    /// Run one full cycle now
    pub async fn run_once(&self) -> MonitoringCycleOutcome {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        let mut failures = Vec::new();

        if let Err(e) = self.step(CycleStep::Ingest, self.ingest()).await {
            failures.push(StepFailure {
                step: CycleStep::Ingest,
                error: e.to_string(),
            });
        }

        if let Err(e) = self
            .step(CycleStep::AggregateMetrics, self.aggregate_metrics())
            .await
        {
            failures.push(StepFailure {
                step: CycleStep::AggregateMetrics,
                error: e.to_string(),
            });
        }

        let report = match self.step(CycleStep::DriftCheck, self.drift_check()).await {
            Ok(report) => Some(report),
            Err(e) => {
                failures.push(StepFailure {
                    step: CycleStep::DriftCheck,
                    error: e.to_string(),
                });
                None
            }
        };

        if let Err(e) = self.step(CycleStep::SystemHealth, self.system_health()).await {
            failures.push(StepFailure {
                step: CycleStep::SystemHealth,
                error: e.to_string(),
            });
        }

        let outcome = MonitoringCycleOutcome {
            cycle,
            success: failures.is_empty(),
            duration: started.elapsed(),
            error: if failures.is_empty() {
                None
            } else {
                Some(
                    failures
                        .iter()
                        .map(|f| format!("{}: {}", f.step, f.error))
                        .collect::<Vec<_>>()
                        .join("; "),
                )
            },
            failures,
            report,
        };

        if outcome.success {
            self.health.set_healthy(components::SCHEDULER).await;
        } else {
            self.health
                .set_degraded(
                    components::SCHEDULER,
                    format!(
                        "{} of {} steps failed in cycle {}",
                        outcome.failures.len(),
                        CycleStep::ALL.len(),
                        cycle
                    ),
                )
                .await;
        }

        self.metrics.record_cycle(&outcome);
        self.logger.log_cycle_completed(&outcome);
        self.outcome_tx.send_replace(Some(outcome.clone()));
        outcome
    }

    async fn step<T, F>(&self, step: CycleStep, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = with_timeout(step.as_str(), self.step_timeout, fut).await;
        if let Err(e) = &result {
            warn!(step = %step, error = %e, "Monitoring step failed");
            self.record_dependency_failure(e).await;
        }
        result
    }

    async fn record_dependency_failure(&self, error: &MonitorError) {
        match error {
            MonitorError::Baseline(msg) => {
                self.health.set_unhealthy(components::BASELINE, msg.clone()).await
            }
            MonitorError::Timeout { .. } => {
                self.health
                    .set_unhealthy(components::STORE, error.to_string())
                    .await
            }
            MonitorError::Store(_) | MonitorError::Io(_) | MonitorError::Serialization(_) => {
                self.health
                    .set_degraded(components::STORE, error.to_string())
                    .await
            }
            MonitorError::InvalidRecord(_) | MonitorError::Notification(_) => {}
        }
    }

    /// New records in before anything reads the windows
    async fn ingest(&self) -> Result<()> {
        let timeout = self.orchestrator.config().store_timeout();
        with_timeout("refresh", timeout, self.orchestrator.store().refresh()).await
    }

    /// Counts and accuracy over the aggregate window, plus the latest drift aggregates
    async fn aggregate_metrics(&self) -> Result<()> {
        let config = self.orchestrator.config();
        let store = self.orchestrator.store();
        let timeout = config.store_timeout();
        let window = TimeWindow::trailing(config.aggregate_window());

        let counts = with_timeout("window_counts", timeout, store.window_counts(&window)).await?;
        let pairs = with_timeout("labeled_pairs", timeout, store.labeled_pairs(&window)).await?;
        let performance = evaluate_pairs(&pairs);
        let drift = self.last_drift.read().await.unwrap_or_default();

        let snapshot = MetricsSnapshot {
            timestamp: Utc::now(),
            model_version: config.model_version.clone(),
            window,
            predictions_count: counts.predictions,
            labels_received: counts.labels,
            accuracy: performance.accuracy,
            precision: performance.precision,
            recall: performance.recall,
            f1_score: performance.f1_score,
            auc_roc: performance.auc_roc,
            avg_psi: drift.avg_psi,
            max_psi: drift.max_psi,
            avg_ks_statistic: drift.avg_ks_statistic,
            drift_alerts_count: drift.alerts,
        };

        if let Err(e) = with_timeout(
            "persist_metrics_snapshot",
            timeout,
            store.persist_metrics_snapshot(&snapshot),
        )
        .await
        {
            self.metrics.inc_persistence_failure("metrics_snapshot");
            return Err(e);
        }

        info!(
            predictions = counts.predictions,
            labels = counts.labels,
            accuracy = ?performance.accuracy,
            "Aggregate metrics recorded"
        );
        Ok(())
    }

    async fn drift_check(&self) -> Result<MonitoringReport> {
        let window = TimeWindow::trailing(self.orchestrator.config().drift_window());
        let report = self.orchestrator.run_cycle(window).await?;

        *self.last_drift.write().await = Some(DriftAggregates::from(&report));

        self.health.set_healthy(components::STORE).await;
        if report.baseline_is_synthetic {
            self.health
                .set_degraded(components::BASELINE, "Using synthetic baseline")
                .await;
        } else {
            self.health.set_healthy(components::BASELINE).await;
        }
        Ok(report)
    }

    async fn system_health(&self) -> Result<()> {
        let snapshot = self.probe.snapshot(WORKER_COMPONENT);
        self.metrics
            .set_worker_usage(snapshot.cpu_usage_pct, snapshot.memory_bytes);

        let timeout = self.orchestrator.config().store_timeout();
        if let Err(e) = with_timeout(
            "persist_system_health",
            timeout,
            self.orchestrator.store().persist_system_health(&snapshot),
        )
        .await
        {
            self.metrics.inc_persistence_failure("system_health");
            return Err(e);
        }
        Ok(())
    }
}
