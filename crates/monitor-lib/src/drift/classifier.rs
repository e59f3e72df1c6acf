//! Drift classification
//!
//! Turns PSI and KS outputs into per-feature and per-prediction verdicts
//! with fixed severity bands, and derives operator recommendations.

use super::stats::{self, KsResult, SummaryStats, DEFAULT_BINS};
use crate::schema::FeatureSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default PSI threshold for flagging a feature as drifted
pub const DEFAULT_PSI_THRESHOLD: f64 = 0.25;

/// Default KS p-value cutoff for prediction drift
pub const DEFAULT_KS_THRESHOLD: f64 = 0.05;

/// Drift verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
    Stable,
    Drifted,
}

impl DriftStatus {
    pub fn is_drifted(&self) -> bool {
        matches!(self, DriftStatus::Drifted)
    }
}

impl std::fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftStatus::Stable => write!(f, "stable"),
            DriftStatus::Drifted => write!(f, "drifted"),
        }
    }
}

/// Severity band of a PSI score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    /// Fixed bands: <0.10 none, [0.10,0.25) low, [0.25,0.5) medium, >=0.5 high
    pub fn from_psi(psi: f64) -> Self {
        if psi >= 0.5 {
            Severity::High
        } else if psi >= 0.25 {
            Severity::Medium
        } else if psi >= 0.1 {
            Severity::Low
        } else {
            Severity::None
        }
    }

    /// Medium and high severities raise alerts
    pub fn is_alerting(&self) -> bool {
        *self >= Severity::Medium
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::None => write!(f, "none"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Identifier of the score driving a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftMethod {
    #[serde(rename = "PSI")]
    Psi,
    #[serde(rename = "KS_test")]
    KsTest,
}

/// Percentage change between baseline and current summaries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionShift {
    pub mean_change_pct: f64,
    pub std_change_pct: f64,
}

/// Drift verdict for one feature in one monitoring cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDriftResult {
    pub feature_name: String,
    /// PSI score
    pub drift_score: f64,
    pub drift_method: DriftMethod,
    pub threshold: f64,
    pub status: DriftStatus,
    pub severity: Severity,
    pub ks_statistic: f64,
    pub ks_p_value: f64,
    pub baseline_stats: SummaryStats,
    pub current_stats: SummaryStats,
    pub distribution_shift: DistributionShift,
}

/// Drift verdict over the model's output probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDriftResult {
    pub method: DriftMethod,
    pub statistic: f64,
    pub p_value: f64,
    pub threshold: f64,
    pub status: DriftStatus,
    pub baseline_positive_rate: f64,
    pub current_positive_rate: f64,
    pub change_pct: f64,
}

/// Thresholds applied by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftThresholds {
    pub psi_threshold: f64,
    pub ks_threshold: f64,
    pub n_bins: usize,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            psi_threshold: DEFAULT_PSI_THRESHOLD,
            ks_threshold: DEFAULT_KS_THRESHOLD,
            n_bins: DEFAULT_BINS,
        }
    }
}

/// Aggregate recommendation over a set of feature results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", content = "features", rename_all = "lowercase")]
pub enum Recommendation {
    /// At least one high-severity feature
    Urgent(Vec<String>),
    /// No high, at least one medium
    Warning(Vec<String>),
    Stable,
}

impl Recommendation {
    pub fn features(&self) -> &[String] {
        match self {
            Recommendation::Urgent(f) | Recommendation::Warning(f) => f,
            Recommendation::Stable => &[],
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::Urgent(features) => write!(
                f,
                "URGENT: Significant drift detected in {} feature(s): {}. \
                 Model retraining strongly recommended. \
                 Investigate data quality and feature engineering pipeline.",
                features.len(),
                features.join(", ")
            ),
            Recommendation::Warning(features) => write!(
                f,
                "WARNING: Moderate drift detected in {} feature(s): {}. \
                 Monitor closely and plan retraining. \
                 Consider A/B testing new model before deployment.",
                features.len(),
                features.join(", ")
            ),
            Recommendation::Stable => write!(f, "All features stable. Continue monitoring."),
        }
    }
}

/// Recommendation for a single drifting feature, used on alerts
pub fn feature_recommendation(result: &FeatureDriftResult) -> String {
    match result.severity {
        Severity::High => format!(
            "Investigate {} data pipeline. Consider retraining model.",
            result.feature_name
        ),
        Severity::Medium => format!(
            "Monitor {} closely. Plan retraining.",
            result.feature_name
        ),
        Severity::Low | Severity::None => "Continue monitoring.".to_string(),
    }
}

/// Stateless drift classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftClassifier {
    thresholds: DriftThresholds,
}

impl DriftClassifier {
    pub fn new(thresholds: DriftThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DriftThresholds {
        &self.thresholds
    }

    /// Classify every requested feature present on both sides.
    ///
    /// Output order follows `feature_names`, or the baseline column order when
    /// no names are given. Features absent from either set, or with no
    /// observed values on either side, produce no result.
    pub fn detect_feature_drift(
        &self,
        baseline: &FeatureSet,
        current: &FeatureSet,
        feature_names: Option<&[String]>,
    ) -> Vec<FeatureDriftResult> {
        let names: Vec<String> = match feature_names {
            Some(names) => names.to_vec(),
            None => baseline.feature_names(),
        };

        let mut results = Vec::with_capacity(names.len());
        for name in &names {
            let (Some(baseline_col), Some(current_col)) =
                (baseline.column(name), current.column(name))
            else {
                warn!(feature = %name, "Feature not found in baseline or current data");
                continue;
            };

            match self.classify_feature(name, &baseline_col.cleaned(), &current_col.cleaned()) {
                Some(result) => results.push(result),
                None => debug!(feature = %name, "No observed values, skipping feature"),
            }
        }

        results
    }

    /// Classify one feature from its cleaned baseline and current values
    pub fn classify_feature(
        &self,
        name: &str,
        baseline: &[f64],
        current: &[f64],
    ) -> Option<FeatureDriftResult> {
        let baseline_stats = SummaryStats::from_values(baseline)?;
        let current_stats = SummaryStats::from_values(current)?;

        let psi = stats::psi(baseline, current, self.thresholds.n_bins);
        let ks = stats::ks_test(baseline, current);

        debug_assert!(psi >= 0.0);
        debug_assert!((0.0..=1.0).contains(&ks.p_value));

        // KS is reported as supporting evidence only
        let status = if psi >= self.thresholds.psi_threshold {
            DriftStatus::Drifted
        } else {
            DriftStatus::Stable
        };

        Some(FeatureDriftResult {
            feature_name: name.to_string(),
            drift_score: psi,
            drift_method: DriftMethod::Psi,
            threshold: self.thresholds.psi_threshold,
            status,
            severity: Severity::from_psi(psi),
            ks_statistic: ks.statistic,
            ks_p_value: ks.p_value,
            distribution_shift: DistributionShift {
                mean_change_pct: stats::percent_change(baseline_stats.mean, current_stats.mean),
                std_change_pct: stats::percent_change(baseline_stats.std, current_stats.std),
            },
            baseline_stats,
            current_stats,
        })
    }

    /// KS-only drift check over prediction probabilities
    pub fn detect_prediction_drift(
        &self,
        baseline_scores: &[f64],
        current_scores: &[f64],
    ) -> PredictionDriftResult {
        let KsResult { statistic, p_value } = stats::ks_test(baseline_scores, current_scores);

        let baseline_rate = stats::mean(baseline_scores).unwrap_or(0.0);
        let current_rate = stats::mean(current_scores).unwrap_or(0.0);

        let status = if p_value < self.thresholds.ks_threshold {
            DriftStatus::Drifted
        } else {
            DriftStatus::Stable
        };

        PredictionDriftResult {
            method: DriftMethod::KsTest,
            statistic,
            p_value,
            threshold: self.thresholds.ks_threshold,
            status,
            baseline_positive_rate: baseline_rate,
            current_positive_rate: current_rate,
            change_pct: stats::percent_change(baseline_rate, current_rate),
        }
    }
}

/// Aggregate recommendation: high dominates medium, medium dominates stable
pub fn generate_recommendation(results: &[FeatureDriftResult]) -> Recommendation {
    let named = |severity: Severity| -> Vec<String> {
        results
            .iter()
            .filter(|r| r.severity == severity)
            .map(|r| r.feature_name.clone())
            .collect()
    };

    let high = named(Severity::High);
    if !high.is_empty() {
        return Recommendation::Urgent(high);
    }

    let medium = named(Severity::Medium);
    if !medium.is_empty() {
        return Recommendation::Warning(medium);
    }

    Recommendation::Stable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Sample;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn amounts(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Normal::new(45.0, 15.0).unwrap();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    fn result_with(name: &str, psi: f64) -> FeatureDriftResult {
        let stats = SummaryStats::from_values(&[1.0]).unwrap();
        FeatureDriftResult {
            feature_name: name.to_string(),
            drift_score: psi,
            drift_method: DriftMethod::Psi,
            threshold: DEFAULT_PSI_THRESHOLD,
            status: if psi >= DEFAULT_PSI_THRESHOLD {
                DriftStatus::Drifted
            } else {
                DriftStatus::Stable
            },
            severity: Severity::from_psi(psi),
            ks_statistic: 0.0,
            ks_p_value: 1.0,
            baseline_stats: stats,
            current_stats: stats,
            distribution_shift: DistributionShift {
                mean_change_pct: 0.0,
                std_change_pct: 0.0,
            },
        }
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::from_psi(0.0), Severity::None);
        assert_eq!(Severity::from_psi(0.099), Severity::None);
        assert_eq!(Severity::from_psi(0.10), Severity::Low);
        assert_eq!(Severity::from_psi(0.249), Severity::Low);
        assert_eq!(Severity::from_psi(0.25), Severity::Medium);
        assert_eq!(Severity::from_psi(0.499), Severity::Medium);
        assert_eq!(Severity::from_psi(0.5), Severity::High);
        assert_eq!(Severity::from_psi(12.0), Severity::High);
    }

    #[test]
    fn test_severity_monotone_and_alerting() {
        let scores = [0.0, 0.05, 0.1, 0.2, 0.3, 0.45, 0.6, 2.0];
        for pair in scores.windows(2) {
            assert!(Severity::from_psi(pair[0]) <= Severity::from_psi(pair[1]));
        }
        assert!(!Severity::Low.is_alerting());
        assert!(Severity::Medium.is_alerting());
        assert!(Severity::High.is_alerting());
    }

    #[test]
    fn test_identical_sets_are_stable() {
        let mut rng = StdRng::seed_from_u64(42);
        let normal = Normal::new(0.0, 1.0).unwrap();

        let mut set = FeatureSet::default();
        for name in ["a", "b", "c"] {
            let values: Vec<f64> = (0..5_000).map(|_| normal.sample(&mut rng)).collect();
            set.insert(name, Sample::from_values(values));
        }
        let current = set.clone();

        let results = DriftClassifier::default().detect_feature_drift(&set, &current, None);
        assert_eq!(results.len(), 3);
        for r in &results {
            assert_eq!(r.status, DriftStatus::Stable);
            assert_eq!(r.severity, Severity::None);
            assert_eq!(r.drift_score, 0.0);
            assert_eq!(r.ks_statistic, 0.0);
        }
    }

    #[test]
    fn test_amount_shift_is_detected() {
        // Mean amount 45 in the baseline, 30% higher in the current window
        let baseline = amounts(42, 10_000);
        let current: Vec<f64> = amounts(43, 10_000)
            .into_iter()
            .map(|v| v * 1.3)
            .collect();

        let mut base_set = FeatureSet::default();
        base_set.insert("amount", Sample::from_values(baseline));
        let mut cur_set = FeatureSet::default();
        cur_set.insert("amount", Sample::from_values(current));

        let results = DriftClassifier::default().detect_feature_drift(&base_set, &cur_set, None);
        let amount = &results[0];

        assert!(amount.drift_score >= 0.25, "psi={}", amount.drift_score);
        assert_eq!(amount.status, DriftStatus::Drifted);
        assert!(matches!(amount.severity, Severity::Medium | Severity::High));
        assert!(amount.distribution_shift.mean_change_pct > 20.0);
        assert!(amount.ks_p_value < 0.05);
    }

    #[test]
    fn test_missing_features_are_skipped_in_requested_order() {
        let mut baseline = FeatureSet::default();
        baseline.insert("x", Sample::from_values(vec![1.0, 2.0, 3.0]));
        baseline.insert("y", Sample::from_values(vec![1.0, 2.0, 3.0]));
        baseline.insert("only_baseline", Sample::from_values(vec![1.0]));

        let mut current = FeatureSet::default();
        current.insert("y", Sample::from_values(vec![1.0, 2.0, 3.0]));
        current.insert("x", Sample::from_values(vec![1.0, 2.0, 3.0]));

        let requested = vec!["y".to_string(), "missing".to_string(), "x".to_string()];
        let results =
            DriftClassifier::default().detect_feature_drift(&baseline, &current, Some(requested.as_slice()));

        let names: Vec<&str> = results.iter().map(|r| r.feature_name.as_str()).collect();
        assert_eq!(names, vec!["y", "x"]);
    }

    #[test]
    fn test_empty_current_column_yields_no_result() {
        let mut baseline = FeatureSet::default();
        baseline.insert("x", Sample::from_values(vec![1.0, 2.0]));
        let mut current = FeatureSet::default();
        current.insert("x", Sample::new(vec![None, None]));

        let results = DriftClassifier::default().detect_feature_drift(&baseline, &current, None);
        assert!(results.is_empty());
    }

    #[test]
    fn test_prediction_drift_against_constant_rate() {
        let classifier = DriftClassifier::default();
        let baseline = vec![0.02; 500];
        let current: Vec<f64> = (0..500).map(|i| if i % 2 == 0 { 0.02 } else { 0.6 }).collect();

        let result = classifier.detect_prediction_drift(&baseline, &current);
        assert_eq!(result.method, DriftMethod::KsTest);
        assert_eq!(result.status, DriftStatus::Drifted);
        assert!((result.baseline_positive_rate - 0.02).abs() < 1e-12);
        assert!((result.current_positive_rate - 0.31).abs() < 1e-9);
        assert!(result.change_pct > 1000.0);
    }

    #[test]
    fn test_prediction_drift_stable_when_identical() {
        let scores: Vec<f64> = (0..200).map(|i| (i % 10) as f64 / 10.0).collect();
        let result = DriftClassifier::default().detect_prediction_drift(&scores, &scores);
        assert_eq!(result.status, DriftStatus::Stable);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_recommendation_tiers() {
        let results = vec![
            result_with("amount", 0.7),
            result_with("velocity", 0.3),
            result_with("distance", 0.9),
        ];
        match generate_recommendation(&results) {
            Recommendation::Urgent(features) => {
                assert_eq!(features, vec!["amount", "distance"]);
            }
            other => panic!("expected urgent, got {:?}", other),
        }

        let medium_only = vec![result_with("velocity", 0.3), result_with("hour", 0.05)];
        let rec = generate_recommendation(&medium_only);
        assert_eq!(rec, Recommendation::Warning(vec!["velocity".to_string()]));
        assert!(rec.to_string().contains("velocity"));

        let calm = vec![result_with("hour", 0.12)];
        assert_eq!(generate_recommendation(&calm), Recommendation::Stable);
        assert!(generate_recommendation(&[]).features().is_empty());
    }

    #[test]
    fn test_feature_recommendation_names_feature() {
        let high = result_with("amount", 0.8);
        assert!(feature_recommendation(&high).contains("amount"));
        assert!(feature_recommendation(&high).contains("retraining"));

        let low = result_with("amount", 0.11);
        assert!(!feature_recommendation(&low).contains("amount"));
    }

    #[test]
    fn test_result_serializes_with_lowercase_enums() {
        let json = serde_json::to_value(result_with("amount", 0.6)).unwrap();
        assert_eq!(json["status"], "drifted");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["drift_method"], "PSI");
    }
}
