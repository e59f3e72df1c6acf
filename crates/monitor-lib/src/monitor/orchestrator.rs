//! Drift orchestrator
//!
//! Runs one drift check over a window: resolves the baseline, pulls the
//! window's features, scores and labels from the store, classifies drift,
//! evaluates performance, derives health and alerts, and persists the
//! report. Holds no per-cycle state, so concurrent calls are safe.

use super::alerts::{alerts_from, AlertNotifier};
use super::report::{HealthStatus, MonitoringReport, OverallStatus};
use crate::config::MonitorConfig;
use crate::drift::{generate_recommendation, DriftClassifier, PredictionDriftResult};
use crate::error::{with_timeout, Result};
use crate::models::TimeWindow;
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::performance::evaluate_pairs;
use crate::schema::FeatureSet;
use crate::store::{BaselineSource, MonitoringStore, SyntheticGenerator};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub struct DriftOrchestrator {
    store: Arc<dyn MonitoringStore>,
    baseline_source: Arc<dyn BaselineSource>,
    notifier: Option<Arc<dyn AlertNotifier>>,
    classifier: DriftClassifier,
    config: MonitorConfig,
    /// Cold-start baseline, generated at most once
    synthetic_baseline: OnceCell<Arc<FeatureSet>>,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
}

impl DriftOrchestrator {
    pub fn new(
        store: Arc<dyn MonitoringStore>,
        baseline_source: Arc<dyn BaselineSource>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            baseline_source,
            notifier: None,
            classifier: DriftClassifier::new(config.thresholds()),
            config,
            synthetic_baseline: OnceCell::new(),
            metrics: MonitorMetrics::new(),
            logger: StructuredLogger::new("drift-monitor"),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MonitoringStore> {
        &self.store
    }

    /// Build, persist and return the drift report for `window`.
    ///
    /// Store and baseline failures are returned as errors. Failures to
    /// persist the finished report or its alerts are only logged.
    pub async fn run_cycle(&self, window: TimeWindow) -> Result<MonitoringReport> {
        let timeout = self.config.store_timeout();
        let (baseline, baseline_is_synthetic) = self.resolve_baseline().await?;

        let current = with_timeout("feature_samples", timeout, self.store.feature_samples(&window)).await?;
        if current.is_empty() {
            debug!(window = %window, "No predictions in window");
            let report = MonitoringReport::empty(window, &self.config.model_version, baseline_is_synthetic);
            self.metrics.record_report(&report);
            self.logger.log_drift_report(&report);
            return Ok(report);
        }

        let feature_drift = self
            .classifier
            .detect_feature_drift(&baseline, &current, None);

        let scores = with_timeout("prediction_scores", timeout, self.store.prediction_scores(&window)).await?;
        let prediction_drift = self.prediction_drift(&window, &scores).await?;

        let pairs = with_timeout("labeled_pairs", timeout, self.store.labeled_pairs(&window)).await?;
        let performance = evaluate_pairs(&pairs);

        let health = HealthStatus::derive(&feature_drift, prediction_drift.as_ref());
        let overall_status = OverallStatus {
            health,
            data_drift_detected: feature_drift.iter().any(|r| r.status.is_drifted()),
            concept_drift_detected: prediction_drift
                .as_ref()
                .map(|p| p.status.is_drifted())
                .unwrap_or(false),
            performance_degraded: self.config.is_performance_degraded(performance.accuracy),
        };

        let report_timestamp = Utc::now();
        let report = MonitoringReport {
            report_timestamp,
            window,
            total_predictions: current.row_count(),
            model_version: self.config.model_version.clone(),
            overall_status,
            alerts: alerts_from(&feature_drift, report_timestamp),
            recommendation: generate_recommendation(&feature_drift),
            feature_drift,
            prediction_drift,
            performance,
            baseline_is_synthetic,
        };

        self.publish(&report).await;
        self.metrics.record_report(&report);
        self.logger.log_drift_report(&report);

        Ok(report)
    }

    /// Persisted baseline, or the synthetic one when none exists
    async fn resolve_baseline(&self) -> Result<(Arc<FeatureSet>, bool)> {
        let loaded = with_timeout(
            "load_baseline",
            self.config.store_timeout(),
            self.baseline_source.load_baseline(),
        )
        .await?;

        if let Some(baseline) = loaded.filter(|b| !b.is_empty()) {
            return Ok((Arc::new(baseline), false));
        }

        let baseline = self
            .synthetic_baseline
            .get_or_try_init(|| async {
                let generator = SyntheticGenerator::new(self.config.synthetic_seed)
                    .with_fraud_rate(self.config.synthetic_fraud_rate);
                let batch = generator.generate_baseline(self.config.synthetic_baseline_samples)?;
                self.logger
                    .log_baseline_fallback(batch.features.row_count(), generator.seed());
                Ok::<_, crate::error::MonitorError>(Arc::new(batch.features))
            })
            .await?;

        Ok((Arc::clone(baseline), true))
    }

    /// KS check of live scores against history, or the constant expected rate
    async fn prediction_drift(
        &self,
        window: &TimeWindow,
        scores: &[f64],
    ) -> Result<Option<PredictionDriftResult>> {
        if scores.is_empty() {
            return Ok(None);
        }

        let wanted = self.config.min_reference_predictions.max(scores.len());
        let history = with_timeout(
            "reference_scores",
            self.config.store_timeout(),
            self.store.reference_scores(window.start, wanted),
        )
        .await?;

        let reference = if !history.is_empty() && history.len() >= self.config.min_reference_predictions {
            history
        } else {
            vec![self.config.baseline_positive_rate; scores.len()]
        };

        Ok(Some(
            self.classifier.detect_prediction_drift(&reference, scores),
        ))
    }

    /// Persist the report and its alerts and push alerts; never fails the cycle
    async fn publish(&self, report: &MonitoringReport) {
        let timeout = self.config.store_timeout();

        if let Err(e) = with_timeout("persist_report", timeout, self.store.persist_report(report)).await {
            self.metrics.inc_persistence_failure("report");
            self.logger.log_persistence_failed("report", &e);
        }

        for alert in &report.alerts {
            self.logger.log_alert(alert);

            if let Err(e) = with_timeout("persist_alert", timeout, self.store.persist_alert(alert)).await {
                self.metrics.inc_persistence_failure("alert");
                self.logger.log_persistence_failed("alert", &e);
            }

            if let Some(notifier) = &self.notifier {
                if let Err(e) = notifier.notify(alert).await {
                    warn!(alert_id = %alert.id, error = %e, "Failed to deliver alert");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::{DriftStatus, Severity};
    use crate::error::MonitorError;
    use crate::models::{
        GroundTruthRecord, LabeledPair, MetricsSnapshot, PredictionRecord, SystemHealthSnapshot,
        WindowCounts,
    };
    use crate::monitor::{Alert, ChannelNotifier};
    use crate::schema::Sample;
    use crate::store::{async_trait, InMemoryStore, StaticBaseline};
    use chrono::{DateTime, Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn hour(offset: i64) -> TimeWindow {
        TimeWindow::new(t0() + Duration::hours(offset), t0() + Duration::hours(offset + 1))
    }

    fn normal(seed: u64, mean: f64, std: f64, n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Normal::new(mean, std).unwrap();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    fn baseline() -> FeatureSet {
        let mut set = FeatureSet::default();
        set.insert("amount", Sample::from_values(normal(1, 45.0, 15.0, 3_000)));
        set.insert(
            "distance_from_home_km",
            Sample::from_values(normal(2, 10.0, 3.0, 3_000)),
        );
        set
    }

    /// Records `n` predictions in `window`, optionally shifting each feature by 4 sigma
    async fn fill(
        store: &InMemoryStore,
        window: TimeWindow,
        n: usize,
        shift_amount: bool,
        shift_distance: bool,
        seed: u64,
    ) {
        let amounts = normal(seed, if shift_amount { 105.0 } else { 45.0 }, 15.0, n);
        let distances = normal(seed + 1, if shift_distance { 22.0 } else { 10.0 }, 3.0, n);

        for i in 0..n {
            let id = format!("{}-{}", window.start.timestamp(), i);
            let mut features = BTreeMap::new();
            features.insert("amount".to_string(), amounts[i]);
            features.insert("distance_from_home_km".to_string(), distances[i]);

            store
                .record_prediction(PredictionRecord {
                    transaction_id: id.clone(),
                    model_version: "xgb_v1.0.0".to_string(),
                    features,
                    prediction: (i % 10 == 0) as u8,
                    probability: 0.02,
                    latency_ms: None,
                    timestamp: window.start + Duration::milliseconds(i as i64 * 100),
                })
                .await
                .unwrap();

            if i % 2 == 0 {
                store
                    .record_ground_truth(GroundTruthRecord {
                        transaction_id: id,
                        actual_label: (i % 20 == 0) as u8,
                        label_source: None,
                        feedback_timestamp: window.start + Duration::minutes(30),
                    })
                    .await;
            }
        }
    }

    fn orchestrator(store: Arc<dyn MonitoringStore>) -> DriftOrchestrator {
        DriftOrchestrator::new(
            store,
            Arc::new(StaticBaseline::new(baseline())),
            MonitorConfig::default(),
        )
    }

    /// Store double that can fail persistence or stall reads
    struct FaultyStore {
        inner: InMemoryStore,
        fail_persist: bool,
        stall_reads: bool,
        persist_attempts: AtomicUsize,
    }

    impl FaultyStore {
        fn new(inner: InMemoryStore) -> Self {
            Self {
                inner,
                fail_persist: false,
                stall_reads: false,
                persist_attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MonitoringStore for FaultyStore {
        async fn feature_samples(&self, window: &TimeWindow) -> Result<FeatureSet> {
            if self.stall_reads {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            }
            self.inner.feature_samples(window).await
        }

        async fn prediction_scores(&self, window: &TimeWindow) -> Result<Vec<f64>> {
            self.inner.prediction_scores(window).await
        }

        async fn labeled_pairs(&self, window: &TimeWindow) -> Result<Vec<LabeledPair>> {
            self.inner.labeled_pairs(window).await
        }

        async fn reference_scores(&self, before: DateTime<Utc>, limit: usize) -> Result<Vec<f64>> {
            self.inner.reference_scores(before, limit).await
        }

        async fn window_counts(&self, window: &TimeWindow) -> Result<WindowCounts> {
            self.inner.window_counts(window).await
        }

        async fn persist_report(&self, report: &MonitoringReport) -> Result<()> {
            self.persist_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_persist {
                return Err(MonitorError::store("connection reset"));
            }
            self.inner.persist_report(report).await
        }

        async fn persist_metrics_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<()> {
            self.inner.persist_metrics_snapshot(snapshot).await
        }

        async fn persist_alert(&self, alert: &Alert) -> Result<()> {
            if self.fail_persist {
                return Err(MonitorError::store("connection reset"));
            }
            self.inner.persist_alert(alert).await
        }

        async fn persist_system_health(&self, snapshot: &SystemHealthSnapshot) -> Result<()> {
            self.inner.persist_system_health(snapshot).await
        }
    }

    #[tokio::test]
    async fn test_empty_window_gives_unknown_report() {
        let store = Arc::new(InMemoryStore::default());
        let report = orchestrator(store.clone()).run_cycle(hour(0)).await.unwrap();

        assert_eq!(report.total_predictions, 0);
        assert_eq!(report.overall_status.health, HealthStatus::Unknown);
        assert!(report.feature_drift.is_empty());
        assert!(report.alerts.is_empty());
        assert!(report.prediction_drift.is_none());
        assert!(!report.performance.is_available());
        assert!(!report.baseline_is_synthetic);
    }

    #[tokio::test]
    async fn test_stable_window_is_healthy() {
        let store = Arc::new(InMemoryStore::default());
        fill(&store, hour(0), 2_000, false, false, 10).await;

        let report = orchestrator(store.clone()).run_cycle(hour(0)).await.unwrap();

        assert_eq!(report.total_predictions, 2_000);
        assert_eq!(report.feature_drift.len(), 2);
        assert!(report
            .feature_drift
            .iter()
            .all(|r| r.status == DriftStatus::Stable));
        assert_eq!(report.overall_status.health, HealthStatus::Healthy);
        assert!(report.alerts.is_empty());
        assert!(report.performance.accuracy.is_some());
        assert_eq!(store.reports().await.len(), 1);
    }

    #[tokio::test]
    async fn test_one_high_feature_is_warning() {
        let store = Arc::new(InMemoryStore::default());
        fill(&store, hour(0), 2_000, true, false, 20).await;

        let report = orchestrator(store).run_cycle(hour(0)).await.unwrap();

        let amount = report.feature("amount").unwrap();
        assert_eq!(amount.severity, Severity::High);
        assert_ne!(report.feature("distance_from_home_km").unwrap().severity, Severity::High);
        assert_eq!(report.overall_status.health, HealthStatus::Warning);
        assert!(report.overall_status.data_drift_detected);
        assert_eq!(report.alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_two_high_features_is_critical() {
        let store = Arc::new(InMemoryStore::default());
        fill(&store, hour(0), 2_000, true, true, 30).await;

        let (notifier, mut rx) = ChannelNotifier::new(8);
        let report = orchestrator(store.clone())
            .with_notifier(Arc::new(notifier))
            .run_cycle(hour(0))
            .await
            .unwrap();

        assert_eq!(report.overall_status.health, HealthStatus::Critical);
        assert_eq!(report.alerts.len(), 2);
        // Alerts follow baseline feature order
        assert_eq!(report.alerts[0].feature_name.as_deref(), Some("amount"));
        assert_eq!(
            report.recommendation.features(),
            &["amount".to_string(), "distance_from_home_km".to_string()]
        );
        assert_eq!(store.alerts().await.len(), 2);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_persist_failure_still_returns_report() {
        let inner = InMemoryStore::default();
        fill(&inner, hour(0), 1_000, true, false, 40).await;
        let mut store = FaultyStore::new(inner);
        store.fail_persist = true;
        let store = Arc::new(store);

        let report = orchestrator(store.clone()).run_cycle(hour(0)).await.unwrap();

        assert_eq!(report.total_predictions, 1_000);
        assert_eq!(report.overall_status.health, HealthStatus::Warning);
        assert_eq!(store.persist_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_timeout_is_cycle_error() {
        let mut store = FaultyStore::new(InMemoryStore::default());
        store.stall_reads = true;

        let config = MonitorConfig {
            store_timeout_secs: 1,
            ..MonitorConfig::default()
        };
        let orchestrator = DriftOrchestrator::new(
            Arc::new(store),
            Arc::new(StaticBaseline::new(baseline())),
            config,
        );

        let err = orchestrator.run_cycle(hour(0)).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_concurrent_cycles_over_disjoint_windows() {
        let store = Arc::new(InMemoryStore::default());
        fill(&store, hour(0), 1_500, true, false, 50).await;
        fill(&store, hour(1), 800, false, false, 60).await;

        let orchestrator = orchestrator(store.clone());
        let (first, second) = tokio::join!(
            orchestrator.run_cycle(hour(0)),
            orchestrator.run_cycle(hour(1))
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.window, hour(0));
        assert_eq!(first.total_predictions, 1_500);
        assert!(first.feature("amount").unwrap().status.is_drifted());

        assert_eq!(second.window, hour(1));
        assert_eq!(second.total_predictions, 800);
        assert!(!second.feature("amount").unwrap().status.is_drifted());
        assert!((second.feature("amount").unwrap().current_stats.mean - 45.0).abs() < 3.0);

        assert_eq!(store.reports().await.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_baseline_falls_back_to_synthetic() {
        let store = Arc::new(InMemoryStore::default());
        fill(&store, hour(0), 500, false, false, 70).await;

        let config = MonitorConfig {
            synthetic_baseline_samples: 2_000,
            ..MonitorConfig::default()
        };
        let orchestrator =
            DriftOrchestrator::new(store, Arc::new(StaticBaseline::empty()), config);

        let report = orchestrator.run_cycle(hour(0)).await.unwrap();
        assert!(report.baseline_is_synthetic);
        assert!(report.feature("amount").is_some());
    }

    #[tokio::test]
    async fn test_prediction_reference_from_history() {
        let store = Arc::new(InMemoryStore::default());
        fill(&store, hour(0), 1_200, false, false, 80).await;
        fill(&store, hour(1), 600, false, false, 90).await;

        let config = MonitorConfig {
            min_reference_predictions: 1_000,
            baseline_positive_rate: 0.5,
            ..MonitorConfig::default()
        };
        let orchestrator =
            DriftOrchestrator::new(store, Arc::new(StaticBaseline::new(baseline())), config);

        // History exists before hour 1, so the 0.5 constant is not used
        let report = orchestrator.run_cycle(hour(1)).await.unwrap();
        let prediction = report.prediction_drift.unwrap();
        assert!((prediction.baseline_positive_rate - 0.02).abs() < 1e-12);
        assert_eq!(prediction.status, DriftStatus::Stable);

        // Not enough history before hour 0, so the constant is the reference
        let report = orchestrator.run_cycle(hour(0)).await.unwrap();
        let prediction = report.prediction_drift.unwrap();
        assert_eq!(prediction.baseline_positive_rate, 0.5);
        assert!(report.overall_status.concept_drift_detected);
    }
}
