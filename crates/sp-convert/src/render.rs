//! Output artifacts: converted SQL with attention markers, and outcome records

use crate::error::{ConvertError, ConvertResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sp_core::{ConversionOutcome, OutcomeKind};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Suffix of the converted SQL file for a unit
pub const SQL_SUFFIX: &str = "_databricks.sql";

/// Suffix of the outcome record file for a unit
pub const OUTCOMES_SUFFIX: &str = "_outcomes.json";

/// Marker prefix for lines that need a human
pub const TODO_MARKER: &str = "-- TODO(sparkport):";

pub fn sql_path(output_dir: &Path, unit: &str) -> PathBuf {
    output_dir.join(format!("{}{}", unit, SQL_SUFFIX))
}

pub fn outcomes_path(output_dir: &Path, unit: &str) -> PathBuf {
    output_dir.join(format!("{}{}", unit, OUTCOMES_SUFFIX))
}

/// Render the converted SQL text of one unit
pub fn render_unit(unit: &str, outcomes: &[ConversionOutcome]) -> String {
    let mut out = String::new();
    let dialect = outcomes.first().map_or("unknown", |o| o.dialect.as_str());
    let _ = writeln!(out, "-- Converted from {} ({}) to Databricks SQL", unit, dialect);

    for outcome in outcomes {
        out.push('\n');
        render_statement(&mut out, outcome);
    }
    out
}

fn render_statement(out: &mut String, outcome: &ConversionOutcome) {
    let _ = writeln!(out, "-- Statement {}: {}", outcome.index + 1, outcome.name);
    let _ = writeln!(out, "-- Source: {}", outcome.dialect);
    let _ = writeln!(out, "-- Status: {}", outcome.kind.label());

    for t in &outcome.transformations {
        let _ = writeln!(
            out,
            "-- Note: {}: {} -> {}",
            t.rule,
            one_line(&t.original),
            display_replacement(&t.replacement)
        );
    }
    for note in &outcome.notes {
        let _ = writeln!(out, "-- Note: {}", one_line(note));
    }

    for line in attention_lines(outcome) {
        let _ = writeln!(out, "{} {}", TODO_MARKER, line);
    }

    let sql = outcome.final_sql.trim();
    if sql.is_empty() {
        let _ = writeln!(out, "-- (statement removed)");
    } else if outcome.kind == OutcomeKind::Failed {
        // keep the unconverted text out of the runnable script
        for line in sql.lines() {
            let _ = writeln!(out, "-- {}", line);
        }
    } else {
        let _ = writeln!(out, "{};", sql);
    }
}

/// One marker line per reason the statement needs attention
pub fn attention_lines(outcome: &ConversionOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(failure) = &outcome.failure {
        lines.push(format!("failed: {}", failure));
    }
    if outcome.kind == OutcomeKind::ManualReviewFlagged {
        lines.push("manual review required before running this statement".to_string());
    }
    for flag in &outcome.flags {
        let mut line = format!(
            "[{}] {}: {}",
            flag.severity,
            flag.pattern,
            one_line(&flag.explanation)
        );
        if let Some(suggestion) = &flag.suggestion {
            let _ = write!(line, " (suggestion: {})", suggestion);
        }
        lines.push(line);
    }
    for cause in &outcome.root_causes {
        lines.push(format!("root cause: {}", cause));
    }
    lines
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn display_replacement(text: &str) -> String {
    if text.trim().is_empty() {
        "(removed)".to_string()
    } else {
        one_line(text)
    }
}

/// Write `value` as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> ConvertResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ConvertError::InvalidRecord {
        path: path.display().to_string(),
        source: e,
    })?;
    write_file(path, &json)
}

/// Read a JSON file written by [`write_json`]
pub fn read_json<T: DeserializeOwned>(path: &Path) -> ConvertResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| ConvertError::ReadFailed {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ConvertError::InvalidRecord {
        path: path.display().to_string(),
        source: e,
    })
}

fn write_file(path: &Path, content: &str) -> ConvertResult<()> {
    let write_err = |e: std::io::Error| ConvertError::WriteFailed {
        path: path.display().to_string(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, content).map_err(write_err)
}

/// Group outcomes by unit, keeping `(unit, index)` order
pub fn group_by_unit(outcomes: &[ConversionOutcome]) -> BTreeMap<&str, Vec<ConversionOutcome>> {
    let mut units: BTreeMap<&str, Vec<ConversionOutcome>> = BTreeMap::new();
    for outcome in outcomes {
        units
            .entry(outcome.unit.as_str())
            .or_default()
            .push(outcome.clone());
    }
    for list in units.values_mut() {
        list.sort_by_key(|o| o.index);
    }
    units
}

/// Write the SQL file and outcome records of every unit
pub fn write_units(output_dir: &Path, outcomes: &[ConversionOutcome]) -> ConvertResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (unit, list) in group_by_unit(outcomes) {
        let sql = sql_path(output_dir, unit);
        write_file(&sql, &render_unit(unit, &list))?;
        let records = outcomes_path(output_dir, unit);
        write_json(&records, &list)?;
        log::debug!("wrote {} and {}", sql.display(), records.display());
        written.push(sql);
        written.push(records);
    }
    Ok(written)
}

/// Load every outcome record file in `output_dir`, sorted by `(unit, index)`
pub fn read_outcomes(output_dir: &Path) -> ConvertResult<Vec<ConversionOutcome>> {
    let entries = std::fs::read_dir(output_dir).map_err(|e| ConvertError::ReadFailed {
        path: output_dir.display().to_string(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(OUTCOMES_SUFFIX))
        })
        .collect();
    files.sort();

    let mut outcomes = Vec::new();
    for file in files {
        let mut list: Vec<ConversionOutcome> = read_json(&file)?;
        outcomes.append(&mut list);
    }
    outcomes.sort_by(|a, b| a.key().cmp(&b.key()));
    Ok(outcomes)
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
