//! Synthetic feature set generation

use anyhow::Result;
use colored::Colorize;
use monitor_lib::store::{
    DriftProfile, FileBaseline, SyntheticBatch, SyntheticGenerator, DEFAULT_FRAUD_RATE,
};
use serde::Serialize;
use std::path::Path;

use crate::error::CliError;
use crate::output::{print_info, print_json, print_success, OutputFormat};

/// What was written by `driftctl baseline`
#[derive(Debug, Clone, Serialize)]
pub struct BaselineSummary {
    pub output: String,
    pub rows: usize,
    pub fraud_rows: usize,
    pub seed: u64,
    pub drifted: bool,
}

/// Generate labeled synthetic traffic, plain or drifted
pub fn generate(
    samples: usize,
    seed: u64,
    fraud_rate: Option<f64>,
    drift: bool,
) -> Result<SyntheticBatch, CliError> {
    if samples == 0 {
        return Err(CliError::InvalidArgument(
            "sample count must be positive".to_string(),
        ));
    }
    if let Some(rate) = fraud_rate {
        if !(0.0..=1.0).contains(&rate) {
            return Err(CliError::InvalidArgument(format!(
                "fraud rate must be in [0, 1], got {}",
                rate
            )));
        }
    }

    let generator = SyntheticGenerator::new(seed);
    let batch = if drift {
        let defaults = DriftProfile::default();
        let profile = DriftProfile {
            fraud_rate: fraud_rate.unwrap_or(defaults.fraud_rate),
            ..defaults
        };
        generator.generate_drifted(samples, profile)
    } else {
        generator
            .with_fraud_rate(fraud_rate.unwrap_or(DEFAULT_FRAUD_RATE))
            .generate_baseline(samples)
    };

    batch.map_err(|e| CliError::InvalidArgument(e.to_string()))
}

/// Generate a feature set and write it where `check` and the worker can read it
pub async fn write_baseline(
    samples: usize,
    seed: u64,
    fraud_rate: Option<f64>,
    drift: bool,
    output: &Path,
    format: OutputFormat,
) -> Result<()> {
    let batch = generate(samples, seed, fraud_rate, drift)?;
    FileBaseline::new(output).save(&batch.features).await?;

    let summary = BaselineSummary {
        output: output.display().to_string(),
        rows: batch.features.row_count(),
        fraud_rows: batch.fraud_count(),
        seed,
        drifted: drift,
    };

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            let kind = if drift { "drifted" } else { "baseline" };
            print_success(&format!(
                "Wrote {} {} rows to {}",
                summary.rows,
                kind,
                summary.output.cyan()
            ));
            print_info(&format!(
                "{} fraudulent rows, seed {}",
                summary.fraud_rows, summary.seed
            ));
        }
    }

    Ok(())
}
