//! Drift Monitor CLI
//!
//! A command-line tool for offline drift checks between feature sets,
//! generating synthetic baselines, and reading persisted monitoring reports.

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use commands::{baseline, check, report};
use monitor_lib::drift::{DEFAULT_BINS, DEFAULT_KS_THRESHOLD, DEFAULT_PSI_THRESHOLD};
use monitor_lib::store::DEFAULT_SEED;
use std::path::PathBuf;
use std::process::ExitCode;

/// Drift Monitor CLI
#[derive(Parser)]
#[command(name = "driftctl")]
#[command(author, version, about = "CLI for the Model Drift Monitor", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a current feature set against a baseline
    Check {
        /// Baseline feature set (JSON)
        #[arg(long)]
        baseline: PathBuf,

        /// Current feature set (JSON)
        #[arg(long)]
        current: PathBuf,

        /// Only check these features (comma separated)
        #[arg(long, value_delimiter = ',')]
        features: Option<Vec<String>>,

        /// PSI at or above which a feature counts as drifted
        #[arg(long, env = "MONITOR_PSI_THRESHOLD", default_value_t = DEFAULT_PSI_THRESHOLD)]
        psi_threshold: f64,

        /// KS p-value cutoff
        #[arg(long, env = "MONITOR_KS_THRESHOLD", default_value_t = DEFAULT_KS_THRESHOLD)]
        ks_threshold: f64,

        /// Number of PSI bins
        #[arg(long, env = "MONITOR_N_BINS", default_value_t = DEFAULT_BINS)]
        bins: usize,

        /// Exit with a failure status when any feature drifted
        #[arg(long)]
        fail_on_drift: bool,
    },

    /// Write a synthetic fraud-transaction feature set
    Baseline {
        /// Number of rows
        #[arg(long, default_value_t = 10_000)]
        samples: usize,

        /// RNG seed
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Share of fraudulent rows
        #[arg(long)]
        fraud_rate: Option<f64>,

        /// Apply the default drift profile (amount +30%, distance +50%)
        #[arg(long)]
        drift: bool,

        /// Output file
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Show reports from a worker report log
    Report {
        /// JSON-lines report log
        #[arg(long, env = "MONITOR_REPORT_LOG")]
        log: PathBuf,

        /// Only show the most recent N reports
        #[arg(long)]
        last: Option<usize>,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Check {
            baseline,
            current,
            features,
            psi_threshold,
            ks_threshold,
            bins,
            fail_on_drift,
        } => {
            let thresholds = check::thresholds(psi_threshold, ks_threshold, bins)?;
            check::run_check(
                &baseline,
                &current,
                features,
                thresholds,
                fail_on_drift,
                cli.format,
            )
            .await?;
        }
        Commands::Baseline {
            samples,
            seed,
            fraud_rate,
            drift,
            output,
        } => {
            baseline::write_baseline(samples, seed, fraud_rate, drift, &output, cli.format).await?;
        }
        Commands::Report { log, last } => {
            report::show_reports(&log, last, cli.format).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
