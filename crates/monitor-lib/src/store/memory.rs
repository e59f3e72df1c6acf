//! In-process monitoring store
//!
//! Keeps prediction and ground-truth records in memory, validated against
//! the feature schema on insert, and records everything the monitoring core
//! persists. Every collection is a FIFO log bounded by [`StoreLimits`].
//! Records can be tailed from JSON-lines feeds and reports can additionally
//! be appended to a JSON-lines log.

use super::{async_trait, JsonlFeed, MonitoringStore};
use crate::error::{MonitorError, Result};
use crate::models::{
    GroundTruthRecord, LabeledPair, MetricsSnapshot, PredictionRecord, SystemHealthSnapshot,
    TimeWindow, WindowCounts,
};
use crate::monitor::{Alert, MonitoringReport};
use crate::schema::{FeatureSchema, FeatureSet, FeatureVector};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default retention (48 hours)
const DEFAULT_RETENTION_HOURS: i64 = 48;

/// Default cap on predictions, and separately on labels
const DEFAULT_MAX_RECORDS: usize = 500_000;

/// Default cap on each history collection
const DEFAULT_MAX_HISTORY: usize = 10_000;

/// Retention and capacity bounds of the in-memory store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// How long an entry is kept after it was recorded
    pub retention: Duration,
    /// Maximum number of predictions held, and separately of labels
    pub max_records: usize,
    /// Maximum number of reports, metrics snapshots, alerts and health snapshots held, each
    pub max_history: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            retention: Duration::hours(DEFAULT_RETENTION_HOURS),
            max_records: DEFAULT_MAX_RECORDS,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

/// FIFO log bounded by length and by age since insertion
#[derive(Debug)]
struct BoundedLog<T> {
    entries: VecDeque<(DateTime<Utc>, T)>,
    max_len: usize,
}

impl<T> BoundedLog<T> {
    fn new(max_len: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_len.min(10_000)),
            max_len: max_len.max(1),
        }
    }

    /// Append `value`, returning the entries it pushed out
    fn push(&mut self, value: T, now: DateTime<Utc>, retention: Duration) -> Vec<T> {
        let mut evicted = self.evict_before(now - retention);
        while self.entries.len() >= self.max_len {
            match self.entries.pop_front() {
                Some((_, old)) => evicted.push(old),
                None => break,
            }
        }
        self.entries.push_back((now, value));
        evicted
    }

    /// Drop entries recorded before `cutoff`
    fn evict_before(&mut self, cutoff: DateTime<Utc>) -> Vec<T> {
        let mut evicted = Vec::new();
        while self.entries.front().is_some_and(|(at, _)| *at < cutoff) {
            if let Some((_, old)) = self.entries.pop_front() {
                evicted.push(old);
            }
        }
        evicted
    }

    fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().map(|(_, value)| value)
    }

    fn last(&self) -> Option<&T> {
        self.entries.back().map(|(_, value)| value)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A prediction after schema validation
#[derive(Debug, Clone)]
struct StoredPrediction {
    transaction_id: String,
    features: FeatureVector,
    prediction: u8,
    probability: f64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct PredictionLog {
    records: BoundedLog<StoredPrediction>,
    ids: HashSet<String>,
}

impl PredictionLog {
    fn new(max_len: usize) -> Self {
        Self {
            records: BoundedLog::new(max_len),
            ids: HashSet::new(),
        }
    }

    fn forget(&mut self, evicted: Vec<StoredPrediction>) -> usize {
        for p in &evicted {
            self.ids.remove(&p.transaction_id);
        }
        evicted.len()
    }
}

/// Labels by transaction id; a replaced label keeps its original slot
#[derive(Debug)]
struct LabelLog {
    by_id: HashMap<String, GroundTruthRecord>,
    order: BoundedLog<String>,
}

impl LabelLog {
    fn new(max_len: usize) -> Self {
        Self {
            by_id: HashMap::new(),
            order: BoundedLog::new(max_len),
        }
    }

    fn insert(&mut self, record: GroundTruthRecord, now: DateTime<Utc>, retention: Duration) {
        if let Some(existing) = self.by_id.get_mut(&record.transaction_id) {
            *existing = record;
            return;
        }
        let evicted = self
            .order
            .push(record.transaction_id.clone(), now, retention);
        self.forget(evicted);
        self.by_id.insert(record.transaction_id.clone(), record);
    }

    fn forget(&mut self, evicted: Vec<String>) -> usize {
        for id in &evicted {
            self.by_id.remove(id);
        }
        evicted.len()
    }
}

/// Counts of everything held by the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub predictions: usize,
    pub labels: usize,
    pub reports: usize,
    pub metrics_snapshots: usize,
    pub alerts: usize,
    pub health_snapshots: usize,
}

/// Monitoring store backed by process memory
pub struct InMemoryStore {
    schema: FeatureSchema,
    limits: StoreLimits,
    predictions: RwLock<PredictionLog>,
    ground_truth: RwLock<LabelLog>,
    reports: RwLock<BoundedLog<MonitoringReport>>,
    metrics: RwLock<BoundedLog<MetricsSnapshot>>,
    alerts: RwLock<BoundedLog<Alert>>,
    health: RwLock<BoundedLog<SystemHealthSnapshot>>,
    report_log: Option<PathBuf>,
    prediction_feed: Option<JsonlFeed>,
    label_feed: Option<JsonlFeed>,
}

impl InMemoryStore {
    pub fn new(schema: FeatureSchema) -> Self {
        Self::with_limits(schema, StoreLimits::default())
    }

    pub fn with_limits(schema: FeatureSchema, limits: StoreLimits) -> Self {
        Self {
            schema,
            limits,
            predictions: RwLock::new(PredictionLog::new(limits.max_records)),
            ground_truth: RwLock::new(LabelLog::new(limits.max_records)),
            reports: RwLock::new(BoundedLog::new(limits.max_history)),
            metrics: RwLock::new(BoundedLog::new(limits.max_history)),
            alerts: RwLock::new(BoundedLog::new(limits.max_history)),
            health: RwLock::new(BoundedLog::new(limits.max_history)),
            report_log: None,
            prediction_feed: None,
            label_feed: None,
        }
    }

    /// Also append every persisted report to a JSON-lines file
    pub fn with_report_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_log = Some(path.into());
        self
    }

    /// Tail prediction records from a JSON-lines file on every refresh
    pub fn with_prediction_feed(mut self, path: impl Into<PathBuf>) -> Self {
        self.prediction_feed = Some(JsonlFeed::new(path));
        self
    }

    /// Tail ground-truth records from a JSON-lines file on every refresh
    pub fn with_label_feed(mut self, path: impl Into<PathBuf>) -> Self {
        self.label_feed = Some(JsonlFeed::new(path));
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Validate and record a prediction; transaction ids must be unique
    pub async fn record_prediction(&self, record: PredictionRecord) -> Result<()> {
        if !(0.0..=1.0).contains(&record.probability) {
            return Err(MonitorError::InvalidRecord(format!(
                "probability {} out of range for {}",
                record.probability, record.transaction_id
            )));
        }
        let features = self.schema.validate(&record.features)?;

        let mut log = self.predictions.write().await;
        if log.ids.contains(&record.transaction_id) {
            return Err(MonitorError::InvalidRecord(format!(
                "duplicate transaction id {}",
                record.transaction_id
            )));
        }

        log.ids.insert(record.transaction_id.clone());
        let evicted = log.records.push(
            StoredPrediction {
                transaction_id: record.transaction_id,
                features,
                prediction: record.prediction,
                probability: record.probability,
                timestamp: record.timestamp,
            },
            Utc::now(),
            self.limits.retention,
        );
        log.forget(evicted);
        Ok(())
    }

    /// Record a ground-truth label; a later label for the same transaction replaces the earlier one
    pub async fn record_ground_truth(&self, record: GroundTruthRecord) {
        self.ground_truth
            .write()
            .await
            .insert(record, Utc::now(), self.limits.retention);
    }

    /// Read new lines from the configured feeds; returns (predictions, labels) recorded
    pub async fn ingest_feeds(&self) -> Result<(usize, usize)> {
        let mut predictions = 0;
        if let Some(feed) = &self.prediction_feed {
            let records: Vec<PredictionRecord> = feed.read_new().await?;
            for record in records {
                let id = record.transaction_id.clone();
                match self.record_prediction(record).await {
                    Ok(()) => predictions += 1,
                    Err(e) => warn!(transaction_id = %id, error = %e, "Skipping invalid prediction record"),
                }
            }
        }

        let mut labels = 0;
        if let Some(feed) = &self.label_feed {
            let records: Vec<GroundTruthRecord> = feed.read_new().await?;
            labels = records.len();
            for record in records {
                self.record_ground_truth(record).await;
            }
        }

        if predictions > 0 || labels > 0 {
            info!(predictions, labels, "Ingested feed records");
        }
        Ok((predictions, labels))
    }

    /// Drop every entry older than the retention period; returns how many went
    pub async fn evict_expired(&self) -> usize {
        let evicted = self.evict_before(Utc::now() - self.limits.retention).await;
        if evicted > 0 {
            debug!(evicted, "Evicted expired store entries");
        }
        evicted
    }

    async fn evict_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut evicted = {
            let mut log = self.predictions.write().await;
            let expired = log.records.evict_before(cutoff);
            log.forget(expired)
        };
        evicted += {
            let mut labels = self.ground_truth.write().await;
            let expired = labels.order.evict_before(cutoff);
            labels.forget(expired)
        };
        evicted += self.reports.write().await.evict_before(cutoff).len();
        evicted += self.metrics.write().await.evict_before(cutoff).len();
        evicted += self.alerts.write().await.evict_before(cutoff).len();
        evicted += self.health.write().await.evict_before(cutoff).len();
        evicted
    }

    pub async fn reports(&self) -> Vec<MonitoringReport> {
        self.reports.read().await.iter().cloned().collect()
    }

    pub async fn latest_report(&self) -> Option<MonitoringReport> {
        self.reports.read().await.last().cloned()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.iter().cloned().collect()
    }

    pub async fn health_snapshots(&self) -> Vec<SystemHealthSnapshot> {
        self.health.read().await.iter().cloned().collect()
    }

    /// Metrics snapshots taken within `[start, end]`, oldest first
    pub async fn metrics_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<MetricsSnapshot> {
        let mut history: Vec<MetricsSnapshot> = self
            .metrics
            .read()
            .await
            .iter()
            .filter(|m| m.timestamp >= start && m.timestamp <= end)
            .cloned()
            .collect();
        history.sort_by_key(|m| m.timestamp);
        history
    }

    pub async fn stats(&self) -> StoreStats {
        StoreStats {
            predictions: self.predictions.read().await.records.len(),
            labels: self.ground_truth.read().await.by_id.len(),
            reports: self.reports.read().await.len(),
            metrics_snapshots: self.metrics.read().await.len(),
            alerts: self.alerts.read().await.len(),
            health_snapshots: self.health.read().await.len(),
        }
    }

    async fn append_to_log(&self, path: &Path, report: &MonitoringReport) -> Result<()> {
        let mut line = serde_json::to_string(report)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(FeatureSchema::default())
    }
}

#[async_trait]
impl MonitoringStore for InMemoryStore {
    async fn refresh(&self) -> Result<()> {
        self.ingest_feeds().await?;
        self.evict_expired().await;
        Ok(())
    }

    async fn feature_samples(&self, window: &TimeWindow) -> Result<FeatureSet> {
        let log = self.predictions.read().await;
        let rows = log
            .records
            .iter()
            .filter(|p| window.contains(p.timestamp))
            .map(|p| &p.features);
        Ok(FeatureSet::from_vectors(&self.schema, rows))
    }

    async fn prediction_scores(&self, window: &TimeWindow) -> Result<Vec<f64>> {
        let log = self.predictions.read().await;
        Ok(log
            .records
            .iter()
            .filter(|p| window.contains(p.timestamp))
            .map(|p| p.probability)
            .collect())
    }

    async fn labeled_pairs(&self, window: &TimeWindow) -> Result<Vec<LabeledPair>> {
        let log = self.predictions.read().await;
        let labels = self.ground_truth.read().await;

        // Unlabeled predictions drop out of the join
        Ok(log
            .records
            .iter()
            .filter(|p| window.contains(p.timestamp))
            .filter_map(|p| {
                labels.by_id.get(&p.transaction_id).map(|gt| LabeledPair {
                    prediction: p.prediction,
                    probability: p.probability,
                    label: gt.actual_label,
                })
            })
            .collect())
    }

    async fn reference_scores(&self, before: DateTime<Utc>, limit: usize) -> Result<Vec<f64>> {
        let log = self.predictions.read().await;
        let mut earlier: Vec<&StoredPrediction> =
            log.records.iter().filter(|p| p.timestamp < before).collect();
        earlier.sort_by_key(|p| std::cmp::Reverse(p.timestamp));
        Ok(earlier
            .into_iter()
            .take(limit)
            .map(|p| p.probability)
            .collect())
    }

    async fn window_counts(&self, window: &TimeWindow) -> Result<WindowCounts> {
        let predictions = self
            .predictions
            .read()
            .await
            .records
            .iter()
            .filter(|p| window.contains(p.timestamp))
            .count();
        let labels = self
            .ground_truth
            .read()
            .await
            .by_id
            .values()
            .filter(|gt| window.contains(gt.feedback_timestamp))
            .count();
        Ok(WindowCounts {
            predictions,
            labels,
        })
    }

    async fn persist_report(&self, report: &MonitoringReport) -> Result<()> {
        if let Some(path) = &self.report_log {
            self.append_to_log(path, report).await?;
        }
        self.reports
            .write()
            .await
            .push(report.clone(), Utc::now(), self.limits.retention);
        debug!(health = %report.overall_status.health, "Report persisted");
        Ok(())
    }

    async fn persist_metrics_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        self.metrics
            .write()
            .await
            .push(snapshot.clone(), Utc::now(), self.limits.retention);
        Ok(())
    }

    async fn persist_alert(&self, alert: &Alert) -> Result<()> {
        self.alerts
            .write()
            .await
            .push(alert.clone(), Utc::now(), self.limits.retention);
        Ok(())
    }

    async fn persist_system_health(&self, snapshot: &SystemHealthSnapshot) -> Result<()> {
        self.health
            .write()
            .await
            .push(snapshot.clone(), Utc::now(), self.limits.retention);
        Ok(())
    }
}
