//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use monitor_lib::drift::Severity;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of rows
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a drift score with fixed precision
pub fn format_score(score: f64) -> String {
    format!("{:.4}", score)
}

/// Format a signed percentage change
pub fn format_change(pct: f64) -> String {
    format!("{:+.1}%", pct)
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "stable" => status.green().to_string(),
        "warning" | "drifted" | "degraded" => status.yellow().to_string(),
        "critical" | "unhealthy" => status.red().to_string(),
        "unknown" => status.dimmed().to_string(),
        _ => status.to_string(),
    }
}

/// Color a PSI severity band
pub fn color_severity(severity: Severity) -> String {
    let label = severity.to_string();
    match severity {
        Severity::High => label.red().bold().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.blue().to_string(),
        Severity::None => label.green().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.123456), "0.1235");
        assert_eq!(format_score(0.0), "0.0000");
    }

    #[test]
    fn test_format_change_is_signed() {
        assert_eq!(format_change(30.04), "+30.0%");
        assert_eq!(format_change(-5.26), "-5.3%");
    }

    #[test]
    fn test_color_status_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(color_status("critical"), "critical");
        assert_eq!(color_severity(Severity::High), "high");
    }
}
