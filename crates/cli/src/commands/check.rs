//! Offline drift check between two feature sets

use anyhow::{Context, Result};
use colored::Colorize;
use monitor_lib::drift::{
    generate_recommendation, DriftClassifier, DriftThresholds, FeatureDriftResult, Recommendation,
};
use monitor_lib::store::{BaselineSource, FileBaseline};
use monitor_lib::FeatureSet;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{
    color_severity, color_status, format_change, format_score, print_info, print_json,
    print_success, print_table, print_warning, OutputFormat,
};

/// Result of comparing a current feature set against its baseline
#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub thresholds: DriftThresholds,
    pub features: Vec<FeatureDriftResult>,
    pub drifted: usize,
    pub recommendation: Recommendation,
}

/// Row for the drift table
#[derive(Tabled)]
struct DriftRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "PSI")]
    psi: String,
    #[tabled(rename = "KS stat")]
    ks_statistic: String,
    #[tabled(rename = "KS p-value")]
    ks_p_value: String,
    #[tabled(rename = "Mean Δ")]
    mean_change: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Severity")]
    severity: String,
}

impl From<&FeatureDriftResult> for DriftRow {
    fn from(result: &FeatureDriftResult) -> Self {
        Self {
            feature: result.feature_name.clone(),
            psi: format_score(result.drift_score),
            ks_statistic: format_score(result.ks_statistic),
            ks_p_value: format_score(result.ks_p_value),
            mean_change: format_change(result.distribution_shift.mean_change_pct),
            status: color_status(&result.status.to_string()),
            severity: color_severity(result.severity),
        }
    }
}

/// Read a JSON feature set written by `driftctl baseline` or the worker
pub async fn load_feature_set(path: &Path) -> Result<FeatureSet> {
    FileBaseline::new(path)
        .load_baseline()
        .await
        .with_context(|| format!("Failed to load feature set from {}", path.display()))?
        .ok_or_else(|| CliError::MissingFile(path.to_path_buf()).into())
}

/// Validate thresholds supplied on the command line
pub fn thresholds(psi: f64, ks: f64, bins: usize) -> Result<DriftThresholds, CliError> {
    if !(psi > 0.0) {
        return Err(CliError::InvalidArgument(format!(
            "psi threshold must be positive, got {}",
            psi
        )));
    }
    if !(ks > 0.0 && ks < 1.0) {
        return Err(CliError::InvalidArgument(format!(
            "ks threshold must be in (0, 1), got {}",
            ks
        )));
    }
    if bins < 2 {
        return Err(CliError::InvalidArgument(format!(
            "at least 2 bins are required, got {}",
            bins
        )));
    }
    Ok(DriftThresholds {
        psi_threshold: psi,
        ks_threshold: ks,
        n_bins: bins,
    })
}

/// Classify every requested feature of `current` against `baseline`
pub fn compare(
    baseline: &FeatureSet,
    current: &FeatureSet,
    features: Option<&[String]>,
    thresholds: DriftThresholds,
) -> Result<CheckSummary, CliError> {
    if let Some(names) = features {
        if let Some(missing) = names.iter().find(|n| baseline.column(n).is_none()) {
            return Err(CliError::UnknownFeature(missing.clone()));
        }
    }

    let results = DriftClassifier::new(thresholds).detect_feature_drift(baseline, current, features);
    let drifted = results.iter().filter(|r| r.status.is_drifted()).count();
    let recommendation = generate_recommendation(&results);

    Ok(CheckSummary {
        thresholds,
        features: results,
        drifted,
        recommendation,
    })
}

/// Run the check and print the outcome
pub async fn run_check(
    baseline_path: &Path,
    current_path: &Path,
    features: Option<Vec<String>>,
    thresholds: DriftThresholds,
    fail_on_drift: bool,
    format: OutputFormat,
) -> Result<()> {
    let baseline = load_feature_set(baseline_path).await?;
    let current = load_feature_set(current_path).await?;
    let summary = compare(&baseline, &current, features.as_deref(), thresholds)?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => print_summary(&summary, baseline.row_count(), current.row_count()),
    }

    if fail_on_drift && summary.drifted > 0 {
        return Err(CliError::DriftDetected(summary.drifted).into());
    }
    Ok(())
}

fn print_summary(summary: &CheckSummary, baseline_rows: usize, current_rows: usize) {
    println!("{}", "Feature Drift".bold());
    println!("{}", "=".repeat(60));
    println!(
        "Baseline rows: {}  Current rows: {}  PSI threshold: {}  KS threshold: {}",
        baseline_rows.to_string().cyan(),
        current_rows.to_string().cyan(),
        summary.thresholds.psi_threshold,
        summary.thresholds.ks_threshold
    );
    println!();

    let rows: Vec<DriftRow> = summary.features.iter().map(DriftRow::from).collect();
    print_table(&rows);
    println!();

    match &summary.recommendation {
        Recommendation::Stable => print_success(&summary.recommendation.to_string()),
        Recommendation::Warning(_) => print_warning(&summary.recommendation.to_string()),
        Recommendation::Urgent(_) => println!(
            "{} {}",
            "✗".red().bold(),
            summary.recommendation.to_string().red()
        ),
    }
    print_info(&format!(
        "{} of {} features drifted",
        summary.drifted,
        summary.features.len()
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_lib::store::SyntheticGenerator;
    use monitor_lib::Sample;

    fn generator() -> SyntheticGenerator {
        SyntheticGenerator::new(42)
    }

    #[test]
    fn test_thresholds_validation() {
        assert!(thresholds(0.25, 0.05, 10).is_ok());
        assert!(matches!(
            thresholds(0.0, 0.05, 10),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(matches!(
            thresholds(0.25, 1.5, 10),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(matches!(
            thresholds(0.25, 0.05, 1),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_compare_same_distribution_is_stable() {
        let baseline = generator().generate_baseline(5_000).unwrap();
        let current = SyntheticGenerator::new(7).generate_baseline(2_000).unwrap();

        let summary = compare(
            &baseline.features,
            &current.features,
            Some(&["amount".to_string(), "hour_of_day".to_string()]),
            DriftThresholds::default(),
        )
        .unwrap();

        assert_eq!(summary.features.len(), 2);
        assert_eq!(summary.drifted, 0);
        assert_eq!(summary.recommendation, Recommendation::Stable);
    }

    fn feature_set(columns: &[(&str, Vec<f64>)]) -> FeatureSet {
        let mut set = FeatureSet::new(Vec::new());
        for (name, values) in columns {
            set.insert(*name, Sample::from_values(values.iter().copied()));
        }
        set
    }

    #[test]
    fn test_compare_shifted_feature_is_urgent() {
        let uniform: Vec<f64> = (0..1_000).map(|i| (i % 100) as f64).collect();
        let shifted: Vec<f64> = uniform.iter().map(|v| v + 50.0).collect();
        let baseline = feature_set(&[("amount", uniform.clone()), ("hour_of_day", uniform.clone())]);
        let current = feature_set(&[("amount", shifted), ("hour_of_day", uniform)]);

        let summary = compare(&baseline, &current, None, DriftThresholds::default()).unwrap();

        assert_eq!(summary.features.len(), 2);
        assert_eq!(summary.drifted, 1);
        assert!(summary.features[0].status.is_drifted());
        assert!(!summary.features[1].status.is_drifted());
        assert_eq!(
            summary.recommendation,
            Recommendation::Urgent(vec!["amount".to_string()])
        );
    }

    #[test]
    fn test_compare_rejects_unknown_feature() {
        let baseline = generator().generate_baseline(100).unwrap();
        let err = compare(
            &baseline.features,
            &baseline.features,
            Some(&["merchant_name".to_string()]),
            DriftThresholds::default(),
        )
        .unwrap_err();

        assert!(matches!(err, CliError::UnknownFeature(name) if name == "merchant_name"));
    }

    #[tokio::test]
    async fn test_load_feature_set_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_feature_set(&dir.path().join("absent.json"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::MissingFile(_))
        ));
    }
}
