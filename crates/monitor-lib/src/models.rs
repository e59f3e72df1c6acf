//! Core data models for the drift monitor

use crate::health::ComponentStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window of the given length ending at `end`
    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: end - length,
            end,
        }
    }

    /// Window of the given length ending now
    pub fn trailing(length: Duration) -> Self {
        Self::ending_at(Utc::now(), length)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )
    }
}

/// A prediction as recorded by the serving path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub transaction_id: String,
    pub model_version: String,
    pub features: BTreeMap<String, f64>,
    /// Predicted class (0 or 1)
    pub prediction: u8,
    /// Probability of the positive class
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Delayed ground-truth label for a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub transaction_id: String,
    pub actual_label: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_source: Option<String>,
    pub feedback_timestamp: DateTime<Utc>,
}

/// A prediction joined with its ground-truth label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledPair {
    pub prediction: u8,
    pub probability: f64,
    pub label: u8,
}

/// Record counts inside a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounts {
    pub predictions: usize,
    pub labels: usize,
}

/// Aggregate metrics computed by the scheduler on every cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub model_version: String,
    pub window: TimeWindow,
    pub predictions_count: usize,
    pub labels_received: usize,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub auc_roc: Option<f64>,
    pub avg_psi: Option<f64>,
    pub max_psi: Option<f64>,
    pub avg_ks_statistic: Option<f64>,
    pub drift_alerts_count: usize,
}

/// Resource usage of the monitoring worker process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub status: ComponentStatus,
    pub cpu_usage_pct: f64,
    pub memory_usage_pct: f64,
    pub memory_bytes: u64,
}
