//! Drift detection
//!
//! This module provides:
//! - PSI and two-sample KS primitives over numeric samples
//! - Per-feature and per-prediction drift classification
//! - Operator recommendations derived from severity tiers

mod classifier;
mod stats;

pub use classifier::{
    feature_recommendation, generate_recommendation, DistributionShift, DriftClassifier,
    DriftMethod, DriftStatus, DriftThresholds, FeatureDriftResult, PredictionDriftResult,
    Recommendation, Severity, DEFAULT_KS_THRESHOLD, DEFAULT_PSI_THRESHOLD,
};
pub use stats::{
    ks_test, mean, percent_change, psi, KsResult, SummaryStats, DEFAULT_BINS, EPSILON,
};
