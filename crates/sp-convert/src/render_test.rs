use super::*;
use sp_core::{
    ExecutionVerdict, FailureReason, RootCause, SemanticFlag, Severity, SourceDialect, Span,
    Transformation,
};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn outcome(index: usize, kind: OutcomeKind, final_sql: &str) -> ConversionOutcome {
    ConversionOutcome {
        unit: "daily".to_string(),
        index,
        name: format!("query_{}", index + 1),
        dialect: SourceDialect::Hive,
        kind,
        original_sql: final_sql.to_string(),
        final_sql: final_sql.to_string(),
        transformations: Vec::new(),
        flags: Vec::new(),
        root_causes: BTreeSet::new(),
        execution_causes: BTreeSet::new(),
        notes: Vec::new(),
        failure: None,
        verdict: ExecutionVerdict::Unknown,
        stages: Vec::new(),
    }
}

#[test]
fn test_auto_fixed_statement() {
    let mut o = outcome(0, OutcomeKind::AutoFixed, "SELECT CAST(x AS STRING) FROM t");
    o.transformations.push(Transformation {
        rule: "varchar-to-string".to_string(),
        pass: 1,
        span: Span::new(17, 29),
        original: "VARCHAR(255)".to_string(),
        replacement: "STRING".to_string(),
    });

    let text = render_unit("daily", &[o]);
    assert_eq!(
        text,
        "-- Converted from daily (hive) to Databricks SQL\n\
         \n\
         -- Statement 1: query_1\n\
         -- Source: hive\n\
         -- Status: AUTO FIXED\n\
         -- Note: varchar-to-string: VARCHAR(255) -> STRING\n\
         SELECT CAST(x AS STRING) FROM t;\n"
    );
}

#[test]
fn test_flagged_statement_carries_markers() {
    let mut o = outcome(
        1,
        OutcomeKind::ManualReviewFlagged,
        "SELECT DISTINCT id, ROW_NUMBER() OVER (ORDER BY ts) FROM t",
    );
    o.flags.push(SemanticFlag {
        pattern: "distinct-with-window".to_string(),
        severity: Severity::ManualReviewRequired,
        span: Span::new(0, 10),
        explanation: "SELECT DISTINCT is combined with\nwindow function ROW_NUMBER()".to_string(),
        suggestion: None,
    });
    o.root_causes.insert(RootCause::SemanticallyInvalidPattern);

    let lines = attention_lines(&o);
    assert_eq!(
        lines,
        vec![
            "manual review required before running this statement".to_string(),
            "[manual review required] distinct-with-window: SELECT DISTINCT is combined with window function ROW_NUMBER()".to_string(),
            "root cause: semantically_invalid_pattern".to_string(),
        ]
    );

    let text = render_unit("daily", &[o]);
    assert!(text.contains("-- Status: MANUAL REVIEW\n"));
    assert_eq!(text.matches(TODO_MARKER).count(), 3);
    // best candidate is still emitted
    assert!(text.ends_with("SELECT DISTINCT id, ROW_NUMBER() OVER (ORDER BY ts) FROM t;\n"));
}

#[test]
fn test_auto_fixable_flag_shows_suggestion() {
    let mut o = outcome(0, OutcomeKind::AutoFixed, "SELECT 1");
    o.flags.push(SemanticFlag {
        pattern: "mixed-aggregate-window".to_string(),
        severity: Severity::AutoFixable,
        span: Span::new(0, 8),
        explanation: "aggregate and window mixed".to_string(),
        suggestion: Some("compute the aggregate in a preceding CTE".to_string()),
    });
    assert_eq!(
        attention_lines(&o),
        vec![
            "[auto-fixable] mixed-aggregate-window: aggregate and window mixed \
             (suggestion: compute the aggregate in a preceding CTE)"
                .to_string()
        ]
    );
}

#[test]
fn test_failed_statement_is_commented_out() {
    let mut o = outcome(2, OutcomeKind::Failed, "SELECT 'abc\nFROM t");
    o.failure = Some(FailureReason::Unparseable {
        message: "unterminated string literal starting at byte 7".to_string(),
    });
    let text = render_unit("daily", &[o]);
    assert!(text.contains(
        "-- TODO(sparkport): failed: unparseable: unterminated string literal starting at byte 7\n"
    ));
    assert!(text.ends_with("-- SELECT 'abc\n-- FROM t\n"));
}

#[test]
fn test_removed_statement() {
    let mut o = outcome(0, OutcomeKind::AutoFixed, "");
    o.transformations.push(Transformation {
        rule: "drop-session-settings".to_string(),
        pass: 1,
        span: Span::new(0, 35),
        original: "SET hive.exec.dynamic.partition=true".to_string(),
        replacement: String::new(),
    });
    let text = render_unit("daily", &[o]);
    assert!(text.contains("-> (removed)\n"));
    assert!(text.ends_with("-- (statement removed)\n"));
    assert!(!text.contains(';'));
}

#[test]
fn test_write_and_read_back() {
    let dir = TempDir::new().unwrap();
    let mut other = outcome(0, OutcomeKind::AutoFixed, "SELECT 2");
    other.unit = "adhoc".to_string();
    let outcomes = vec![
        outcome(1, OutcomeKind::AutoFixed, "SELECT 1"),
        other,
        outcome(0, OutcomeKind::AiConverted, "SELECT 0"),
    ];

    let written = write_units(dir.path(), &outcomes).unwrap();
    assert_eq!(written.len(), 4);
    assert!(sql_path(dir.path(), "daily").exists());
    assert!(outcomes_path(dir.path(), "adhoc").exists());

    let daily = std::fs::read_to_string(sql_path(dir.path(), "daily")).unwrap();
    let first = daily.find("SELECT 0;").unwrap();
    let second = daily.find("SELECT 1;").unwrap();
    assert!(first < second);

    let back = read_outcomes(dir.path()).unwrap();
    let keys: Vec<(&str, usize)> = back.iter().map(|o| o.key()).collect();
    assert_eq!(keys, vec![("adhoc", 0), ("daily", 0), ("daily", 1)]);
    assert_eq!(back[1].kind, OutcomeKind::AiConverted);
}

#[test]
fn test_read_outcomes_rejects_bad_records() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bad_outcomes.json"), "{not json").unwrap();
    let err = read_outcomes(dir.path()).unwrap_err();
    assert!(matches!(err, ConvertError::InvalidRecord { .. }));
}
