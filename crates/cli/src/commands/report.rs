//! Rendering of persisted monitoring reports

use anyhow::{Context, Result};
use colored::Colorize;
use monitor_lib::MonitoringReport;
use std::path::Path;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{color_status, format_score, print_json, print_table, print_warning, OutputFormat};

/// Row for the report history table
#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Generated")]
    generated: String,
    #[tabled(rename = "Window")]
    window: String,
    #[tabled(rename = "Predictions")]
    predictions: usize,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Drifted")]
    drifted: usize,
    #[tabled(rename = "Max PSI")]
    max_psi: String,
    #[tabled(rename = "Concept")]
    concept_drift: String,
    #[tabled(rename = "Alerts")]
    alerts: usize,
}

impl From<&MonitoringReport> for ReportRow {
    fn from(report: &MonitoringReport) -> Self {
        let status = &report.overall_status;
        Self {
            generated: report.report_timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            window: report.window.to_string(),
            predictions: report.total_predictions,
            health: color_status(&status.health.to_string()),
            drifted: report.drifted_feature_count(),
            max_psi: report
                .max_psi()
                .map(format_score)
                .unwrap_or_else(|| "-".to_string()),
            concept_drift: if status.concept_drift_detected {
                "yes".yellow().to_string()
            } else {
                "no".to_string()
            },
            alerts: report.alerts.len(),
        }
    }
}

/// Parse a JSON-lines report log, skipping blank lines
pub fn parse_reports(path: &Path, content: &str) -> Result<Vec<MonitoringReport>, CliError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| CliError::MalformedReport {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// Read the last `last` reports of a log, oldest first
pub async fn read_reports(path: &Path, last: Option<usize>) -> Result<Vec<MonitoringReport>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(CliError::MissingFile(path.to_path_buf()).into());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read report log {}", path.display()))?;

    let mut reports = parse_reports(path, &content)?;
    if let Some(last) = last {
        let skip = reports.len().saturating_sub(last);
        reports.drain(..skip);
    }
    Ok(reports)
}

/// Print persisted reports as a history table, with detail for the newest
pub async fn show_reports(path: &Path, last: Option<usize>, format: OutputFormat) -> Result<()> {
    let reports = read_reports(path, last).await?;

    match format {
        OutputFormat::Json => print_json(&reports)?,
        OutputFormat::Table => {
            if reports.is_empty() {
                print_warning("No reports found in log");
                return Ok(());
            }

            println!("{}", "Monitoring Reports".bold());
            println!("{}", "=".repeat(60));
            let rows: Vec<ReportRow> = reports.iter().map(ReportRow::from).collect();
            print_table(&rows);

            if let Some(latest) = reports.last() {
                println!();
                println!("Model:          {}", latest.model_version.cyan());
                if latest.baseline_is_synthetic {
                    print_warning("Latest report was computed against a synthetic baseline");
                }
                for alert in &latest.alerts {
                    println!("  {} {}", "•".yellow(), alert.message);
                }
                println!("Recommendation: {}", latest.recommendation);
            }
        }
    }

    Ok(())
}
