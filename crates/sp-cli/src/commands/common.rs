//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sp_core::{Config, ConversionReport, OutcomeKind, RootCause, SourceDialect};
use sp_warehouse::{DatabricksClient, RetryPolicy};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::GlobalArgs;

/// Name of the run report written next to the unit artifacts
pub(crate) const REPORT_FILE: &str = "conversion_report.json";

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // control flow only; main.rs maps it to the process exit status
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Project root and loaded configuration
pub(crate) struct ProjectContext {
    pub root: PathBuf,
    pub config: Config,
}

/// Load `sparkport.yml` from `--config` or the project directory.
///
/// A project without a config file runs on defaults.
pub(crate) fn load_project(global: &GlobalArgs) -> Result<ProjectContext> {
    let root = PathBuf::from(&global.project_dir);
    let config = match &global.config {
        Some(path) => Config::load(Path::new(path))
            .with_context(|| format!("Failed to load config {}", path))?,
        None => Config::load_or_default(&root).context("Failed to load project config")?,
    };
    if global.verbose {
        eprintln!("[verbose] Project directory: {}", root.display());
    }
    Ok(ProjectContext { root, config })
}

/// Resolve a directory override against the project root
pub(crate) fn resolve_dir(root: &Path, override_dir: Option<&str>, configured: &str) -> PathBuf {
    root.join(override_dir.unwrap_or(configured))
}

pub(crate) fn parse_dialect(name: Option<&str>) -> Result<Option<SourceDialect>> {
    name.map(|n| SourceDialect::from_str(n).context("Invalid --dialect"))
        .transpose()
}

pub(crate) fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy::from_config(&config.service)
}

/// Databricks client when host, token and warehouse id are available
pub(crate) fn warehouse_client(config: &Config, global: &GlobalArgs) -> Option<Arc<DatabricksClient>> {
    match DatabricksClient::from_config(config) {
        Ok(client) => {
            if global.verbose {
                eprintln!("[verbose] Using SQL warehouse at {}", client.settings().host);
            }
            Some(Arc::new(client))
        }
        Err(e) => {
            if global.verbose {
                eprintln!("[verbose] {}", e);
            }
            None
        }
    }
}

/// Envelope written to `conversion_report.json`
#[derive(Debug, Serialize)]
pub(crate) struct RunReport<'a> {
    pub run_id: String,
    pub command: &'static str,
    pub timestamp: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub success_rate: f64,
    #[serde(flatten)]
    pub report: &'a ConversionReport,
}

impl<'a> RunReport<'a> {
    pub fn new(command: &'static str, elapsed_secs: f64, report: &'a ConversionReport) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            command,
            timestamp: Utc::now(),
            elapsed_secs,
            success_rate: report.success_rate(),
            report,
        }
    }
}

/// Serialize `data` as pretty-printed JSON and write it to `path`
pub(crate) fn write_json_results<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    let json = serde_json::to_string_pretty(data).context("Failed to serialize results")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Print per-outcome and per-root-cause counts
pub(crate) fn print_summary(report: &ConversionReport) {
    let rows: Vec<Vec<String>> = OutcomeKind::ALL
        .iter()
        .map(|k| vec![k.label().to_string(), report.count(*k).to_string()])
        .collect();
    print_table(&["OUTCOME", "STATEMENTS"], &rows);
    println!();

    let causes: Vec<Vec<String>> = RootCause::ALL
        .iter()
        .filter(|c| report.root_cause_count(**c) > 0)
        .map(|c| vec![c.to_string(), report.root_cause_count(*c).to_string()])
        .collect();
    if !causes.is_empty() {
        print_table(&["ROOT CAUSE", "STATEMENTS"], &causes);
        println!();
    }

    println!(
        "{} statements, {:.1}% converted without manual review",
        report.total,
        report.success_rate()
    );
}

/// List the statements that need a human, one line each
pub(crate) fn print_attention(report: &ConversionReport) {
    let mut any = false;
    for outcome in report.needing_attention() {
        if !any {
            println!("\nNeeds attention:");
            any = true;
        }
        let causes: Vec<String> = outcome.root_causes.iter().map(|c| c.to_string()).collect();
        println!(
            "  {}#{} {} [{}] {}",
            outcome.unit,
            outcome.index + 1,
            outcome.name,
            outcome.kind.label(),
            causes.join(", ")
        );
    }
}

// ---------------------------------------------------------------------------
// Table-printing utilities
// ---------------------------------------------------------------------------

/// Calculate column widths for a table given headers and row data
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a left-aligned table with a dashed separator under the header
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  ").trim_end());

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  ").trim_end());
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
