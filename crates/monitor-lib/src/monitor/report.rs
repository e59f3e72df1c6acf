//! Monitoring report values

use super::alerts::Alert;
use crate::drift::{FeatureDriftResult, PredictionDriftResult, Recommendation, Severity};
use crate::models::TimeWindow;
use crate::performance::PerformanceSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall model health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    /// No data in the window
    Unknown,
}

impl HealthStatus {
    /// Precedence rule: two or more high-severity features are critical,
    /// otherwise any drift (feature or prediction) is a warning.
    pub fn derive(features: &[FeatureDriftResult], prediction: Option<&PredictionDriftResult>) -> Self {
        let high = features
            .iter()
            .filter(|r| r.severity == Severity::High)
            .count();
        let data_drift = features.iter().any(|r| r.status.is_drifted());
        let concept_drift = prediction.map(|p| p.status.is_drifted()).unwrap_or(false);

        if high >= 2 {
            HealthStatus::Critical
        } else if data_drift || concept_drift {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn is_alerting(&self) -> bool {
        matches!(self, HealthStatus::Warning | HealthStatus::Critical)
    }

    /// Gauge encoding: -1 unknown, 0 healthy, 1 warning, 2 critical
    pub fn as_gauge(&self) -> i64 {
        match self {
            HealthStatus::Unknown => -1,
            HealthStatus::Healthy => 0,
            HealthStatus::Warning => 1,
            HealthStatus::Critical => 2,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Critical => write!(f, "critical"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallStatus {
    pub health: HealthStatus,
    pub data_drift_detected: bool,
    pub concept_drift_detected: bool,
    pub performance_degraded: bool,
}

impl OverallStatus {
    pub fn unknown() -> Self {
        Self {
            health: HealthStatus::Unknown,
            data_drift_detected: false,
            concept_drift_detected: false,
            performance_degraded: false,
        }
    }
}

/// Result of one drift check over a window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub report_timestamp: DateTime<Utc>,
    pub window: TimeWindow,
    pub total_predictions: usize,
    pub model_version: String,
    pub overall_status: OverallStatus,
    pub feature_drift: Vec<FeatureDriftResult>,
    pub prediction_drift: Option<PredictionDriftResult>,
    pub performance: PerformanceSnapshot,
    pub alerts: Vec<Alert>,
    pub recommendation: Recommendation,
    /// The baseline was generated rather than loaded, so drift verdicts carry less weight
    pub baseline_is_synthetic: bool,
}

impl MonitoringReport {
    /// Report for a window without predictions
    pub fn empty(window: TimeWindow, model_version: impl Into<String>, baseline_is_synthetic: bool) -> Self {
        Self {
            report_timestamp: Utc::now(),
            window,
            total_predictions: 0,
            model_version: model_version.into(),
            overall_status: OverallStatus::unknown(),
            feature_drift: Vec::new(),
            prediction_drift: None,
            performance: PerformanceSnapshot::unavailable(),
            alerts: Vec::new(),
            recommendation: Recommendation::Stable,
            baseline_is_synthetic,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_predictions == 0
    }

    pub fn drifted_feature_count(&self) -> usize {
        self.feature_drift
            .iter()
            .filter(|r| r.status.is_drifted())
            .count()
    }

    pub fn max_psi(&self) -> Option<f64> {
        self.feature_drift
            .iter()
            .map(|r| r.drift_score)
            .fold(None, |acc, psi| Some(acc.map_or(psi, |m: f64| m.max(psi))))
    }

    pub fn avg_psi(&self) -> Option<f64> {
        let scores: Vec<f64> = self.feature_drift.iter().map(|r| r.drift_score).collect();
        crate::drift::mean(&scores)
    }

    pub fn avg_ks_statistic(&self) -> Option<f64> {
        let stats: Vec<f64> = self.feature_drift.iter().map(|r| r.ks_statistic).collect();
        crate::drift::mean(&stats)
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureDriftResult> {
        self.feature_drift.iter().find(|r| r.feature_name == name)
    }
}
