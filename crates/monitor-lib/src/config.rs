//! Monitoring configuration shared by the orchestrator and scheduler

use crate::drift::{DriftThresholds, DEFAULT_BINS, DEFAULT_KS_THRESHOLD, DEFAULT_PSI_THRESHOLD};
use crate::store::{StoreLimits, DEFAULT_BASELINE_SAMPLES, DEFAULT_FRAUD_RATE, DEFAULT_SEED};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL_VERSION: &str = "xgb_v1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub model_version: String,

    pub psi_threshold: f64,
    /// KS p-value cutoff for prediction drift
    pub ks_threshold: f64,
    pub n_bins: usize,

    /// Expected positive-class rate used as the cold-start prediction reference
    pub baseline_positive_rate: f64,
    /// Historical scores needed before they replace the constant reference
    pub min_reference_predictions: usize,

    /// Accuracy the model is expected to hold; unset disables the degradation flag
    pub reference_accuracy: Option<f64>,
    pub performance_degradation_threshold: f64,

    pub monitoring_interval_secs: u64,
    pub drift_window_hours: i64,
    pub aggregate_window_hours: i64,
    /// Bound on every store or baseline call
    pub store_timeout_secs: u64,
    /// Bound on each scheduler cycle step
    pub step_timeout_secs: u64,

    pub synthetic_seed: u64,
    pub synthetic_fraud_rate: f64,
    pub synthetic_baseline_samples: usize,

    /// Hours the in-memory store keeps any entry
    pub store_retention_hours: i64,
    pub store_max_records: usize,
    pub store_max_history: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let limits = StoreLimits::default();
        Self {
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            psi_threshold: DEFAULT_PSI_THRESHOLD,
            ks_threshold: DEFAULT_KS_THRESHOLD,
            n_bins: DEFAULT_BINS,
            baseline_positive_rate: DEFAULT_FRAUD_RATE,
            min_reference_predictions: 1_000,
            reference_accuracy: None,
            performance_degradation_threshold: 0.05,
            monitoring_interval_secs: 30,
            drift_window_hours: 1,
            aggregate_window_hours: 1,
            store_timeout_secs: 5,
            step_timeout_secs: 20,
            synthetic_seed: DEFAULT_SEED,
            synthetic_fraud_rate: DEFAULT_FRAUD_RATE,
            synthetic_baseline_samples: DEFAULT_BASELINE_SAMPLES,
            store_retention_hours: limits.retention.num_hours(),
            store_max_records: limits.max_records,
            store_max_history: limits.max_history,
        }
    }
}

impl MonitorConfig {
    pub fn thresholds(&self) -> DriftThresholds {
        DriftThresholds {
            psi_threshold: self.psi_threshold,
            ks_threshold: self.ks_threshold,
            n_bins: self.n_bins.max(2),
        }
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring_interval_secs.max(1))
    }

    pub fn drift_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.drift_window_hours.max(1))
    }

    pub fn aggregate_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.aggregate_window_hours.max(1))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs.max(1))
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs.max(1))
    }

    /// Store bounds; retention never drops below the windows the cycle reads
    pub fn store_limits(&self) -> StoreLimits {
        let min_hours = self.drift_window_hours.max(self.aggregate_window_hours).max(1) * 2;
        StoreLimits {
            retention: chrono::Duration::hours(self.store_retention_hours.max(min_hours)),
            max_records: self.store_max_records.max(1),
            max_history: self.store_max_history.max(1),
        }
    }

    /// True when accuracy fell below the reference by more than the allowed margin
    pub fn is_performance_degraded(&self, accuracy: Option<f64>) -> bool {
        match (self.reference_accuracy, accuracy) {
            (Some(reference), Some(accuracy)) => {
                accuracy < reference - self.performance_degradation_threshold
            }
            _ => false,
        }
    }
}
