use super::*;
use async_trait::async_trait;
use sp_core::SourceDialect;
use sp_sql::udf::declared_temporary_functions;
use sp_sql::{split, RuleCatalog, DEFAULT_MAX_PASSES};
use sp_warehouse::{CapabilityResult, OfflineValidator};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ── Fakes ──

/// Rejects any statement containing `reject_if`, records what it saw
struct FakeValidator {
    reject_if: Option<&'static str>,
    message: &'static str,
    unavailable: bool,
    seen: Mutex<Vec<String>>,
    calls: AtomicU32,
}

impl FakeValidator {
    fn accepting() -> Self {
        Self {
            reject_if: None,
            message: "",
            unavailable: false,
            seen: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    fn rejecting(needle: &'static str, message: &'static str) -> Self {
        Self {
            reject_if: Some(needle),
            message,
            ..Self::accepting()
        }
    }

    fn down() -> Self {
        Self {
            unavailable: true,
            ..Self::accepting()
        }
    }
}

#[async_trait]
impl SyntaxValidator for FakeValidator {
    async fn validate(&self, sql: &str) -> CapabilityResult<SyntaxVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(sql.to_string());
        if self.unavailable {
            return Err(CapabilityError::Transient {
                service: SYNTAX_VALIDATOR,
                message: "HTTP 503: warehouse starting".to_string(),
            });
        }
        match self.reject_if {
            Some(needle) if sql.contains(needle) => Ok(SyntaxVerdict::Invalid {
                message: self.message.to_string(),
            }),
            _ => Ok(SyntaxVerdict::Valid),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Returns a fixed candidate (or a rejection) and records requests
struct FakeAi {
    answer: Result<&'static str, &'static str>,
    requests: Mutex<Vec<ConversionRequest>>,
}

impl FakeAi {
    fn answering(sql: &'static str) -> Self {
        Self {
            answer: Ok(sql),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &'static str) -> Self {
        Self {
            answer: Err(message),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AiConverter for FakeAi {
    async fn convert(&self, request: &ConversionRequest) -> CapabilityResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        match self.answer {
            Ok(sql) => Ok(sql.to_string()),
            Err(message) => Err(CapabilityError::Rejected {
                service: AI_CONVERTER,
                message: message.to_string(),
            }),
        }
    }
}

// ── Helpers ──

fn engine(max_passes: usize) -> RewriteEngine {
    let catalog = Arc::new(RuleCatalog::builtin().unwrap());
    RewriteEngine::new(catalog, max_passes).unwrap()
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(5),
        max_retries: 1,
        backoff: Duration::from_millis(1),
    }
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(engine(DEFAULT_MAX_PASSES)).with_policy(fast_policy())
}

/// Statement `index` of a script, plus the unit's declared functions
fn statement(script: &str, dialect: SourceDialect, index: usize) -> (Statement, BTreeSet<String>) {
    let unit = split("unit", script, dialect);
    let declared = declared_temporary_functions(unit.statements());
    let stmt = unit.statements().nth(index).unwrap().clone();
    (stmt, declared)
}

const UDF_SCRIPT: &str = "CREATE TEMPORARY FUNCTION score_risk AS 'com.acme.RiskScore';\n\
                          SELECT score_risk(a) AS risk FROM t";
const UNRESOLVED: &str = "[UNRESOLVED_ROUTINE] Cannot resolve routine `score_risk`";

// ── Rule-only paths ──

#[tokio::test]
async fn test_clean_rewrite_is_auto_fixed() {
    let validator = Arc::new(FakeValidator::accepting());
    let orch = orchestrator().with_validator(validator.clone());
    let (stmt, udfs) = statement(
        "SELECT CAST(x AS VARCHAR(255)) FROM t",
        SourceDialect::Trino,
        0,
    );

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::AutoFixed);
    assert_eq!(outcome.final_sql, "SELECT CAST(x AS STRING) FROM t");
    assert_eq!(outcome.transformations.len(), 1);
    assert!(outcome.root_causes.is_empty());
    assert_eq!(
        outcome.stages,
        vec![
            Stage::Scanned,
            Stage::Rewritten,
            Stage::SyntaxChecked,
            Stage::AutoFixed
        ]
    );
    assert_eq!(
        *validator.seen.lock().unwrap(),
        vec!["SELECT CAST(x AS STRING) FROM t".to_string()]
    );
}

#[tokio::test]
async fn test_without_validator_skips_syntax_check() {
    let (stmt, udfs) = statement("SELECT cardinality(tags) FROM t", SourceDialect::Trino, 0);
    let outcome = orchestrator().convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::AutoFixed);
    assert_eq!(outcome.final_sql, "SELECT size(tags) FROM t");
    assert_eq!(
        outcome.stages,
        vec![Stage::Scanned, Stage::Rewritten, Stage::AutoFixed]
    );
}

#[tokio::test]
async fn test_removed_statement_is_auto_fixed_without_validation() {
    let validator = Arc::new(FakeValidator::accepting());
    let orch = orchestrator().with_validator(validator.clone());
    let (stmt, udfs) = statement(
        "SET hive.exec.dynamic.partition=true",
        SourceDialect::Hive,
        0,
    );

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::AutoFixed);
    assert_eq!(outcome.final_sql, "");
    assert!(outcome.notes[0].starts_with("statement removed"));
    assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ctas_is_validated_through_its_query() {
    let validator = Arc::new(FakeValidator::accepting());
    let orch = orchestrator().with_validator(validator.clone());
    let (stmt, udfs) = statement(
        "CREATE TABLE daily STORED AS PARQUET AS SELECT id FROM users",
        SourceDialect::Hive,
        0,
    );

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::AutoFixed);
    assert_eq!(outcome.name, "daily");
    assert_eq!(
        *validator.seen.lock().unwrap(),
        vec!["SELECT id FROM users".to_string()]
    );
}

#[test]
fn test_explain_target() {
    assert_eq!(
        explain_target("CREATE TABLE x USING ICEBERG AS SELECT 1"),
        "SELECT 1"
    );
    assert_eq!(explain_target("  SELECT a FROM t \n"), "SELECT a FROM t");
}

// ── Failures ──

#[tokio::test]
async fn test_unparseable_statement_fails() {
    let (stmt, udfs) = statement("SELECT 'abc FROM t", SourceDialect::Trino, 0);
    let outcome = orchestrator().convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::Failed);
    assert!(matches!(
        outcome.failure,
        Some(FailureReason::Unparseable { .. })
    ));
    assert!(outcome
        .root_causes
        .contains(&RootCause::SyntaxUnsupportedConstruct));
    assert_eq!(outcome.stages, vec![Stage::Scanned, Stage::Failed]);
    assert_eq!(outcome.final_sql, outcome.original_sql);
}

#[tokio::test]
async fn test_non_converging_rewrite_fails() {
    let orch = Orchestrator::new(engine(1));
    let (stmt, udfs) = statement(
        "SELECT CAST(x AS VARCHAR(255)) FROM t",
        SourceDialect::Trino,
        0,
    );
    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::Failed);
    assert_eq!(
        outcome.failure,
        Some(FailureReason::RewriteDidNotConverge { passes: 1 })
    );
    assert!(outcome
        .root_causes
        .contains(&RootCause::RewriteDidNotConverge));
}

#[tokio::test]
async fn test_not_processed_keeps_statement_text() {
    let (stmt, _) = statement("SELECT 1", SourceDialect::Trino, 0);
    let outcome = not_processed(&stmt, FailureReason::Cancelled);
    assert_eq!(outcome.kind, OutcomeKind::Failed);
    assert_eq!(outcome.failure, Some(FailureReason::Cancelled));
    assert_eq!(outcome.final_sql, "SELECT 1");
    assert!(outcome.root_causes.is_empty());
}

// ── Semantic flags ──

#[tokio::test]
async fn test_distinct_window_needs_review_even_when_syntax_passes() {
    let validator = Arc::new(FakeValidator::accepting());
    let orch = orchestrator().with_validator(validator);
    let (stmt, udfs) = statement(
        "SELECT DISTINCT id, ROW_NUMBER() OVER (PARTITION BY id ORDER BY ts) AS rn FROM t",
        SourceDialect::Hive,
        0,
    );

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::ManualReviewFlagged);
    assert_eq!(outcome.flags.len(), 1);
    assert_eq!(outcome.flags[0].pattern, "distinct-with-window");
    assert_eq!(
        outcome.root_causes,
        BTreeSet::from([RootCause::SemanticallyInvalidPattern])
    );
    assert_eq!(
        outcome.stages,
        vec![
            Stage::Scanned,
            Stage::Rewritten,
            Stage::SyntaxChecked,
            Stage::NeedsEscalation,
            Stage::ManualReviewFlagged
        ]
    );
    assert!(outcome.needs_attention());
}

#[tokio::test]
async fn test_flag_list_is_the_escalation_reason() {
    let ai = Arc::new(FakeAi::answering(
        "SELECT id, rn FROM (SELECT id, ROW_NUMBER() OVER (PARTITION BY id ORDER BY ts) AS rn FROM t) s GROUP BY id, rn",
    ));
    let orch = orchestrator().with_ai(ai.clone());
    let (stmt, udfs) = statement(
        "SELECT DISTINCT id, ROW_NUMBER() OVER (PARTITION BY id ORDER BY ts) AS rn FROM t",
        SourceDialect::Hive,
        0,
    );

    let outcome = orch.convert(&stmt, &udfs).await;
    let requests = ai.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].reason.starts_with("distinct-with-window: "));
    assert_eq!(outcome.kind, OutcomeKind::AiConverted);
    assert!(outcome.flags.is_empty());
    assert!(outcome.root_causes.is_empty());
}

// ── UDF escalation ──

#[tokio::test]
async fn test_udf_statement_converted_by_ai() {
    let validator = Arc::new(FakeValidator::rejecting("score_risk", UNRESOLVED));
    let ai = Arc::new(FakeAi::answering("SELECT CAST(a AS DOUBLE) AS risk FROM t"));
    let orch = orchestrator()
        .with_validator(validator.clone())
        .with_ai(ai.clone());
    let (stmt, udfs) = statement(UDF_SCRIPT, SourceDialect::Hive, 1);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::AiConverted);
    assert_eq!(outcome.final_sql, "SELECT CAST(a AS DOUBLE) AS risk FROM t");
    assert!(outcome.root_causes.is_empty());
    assert_eq!(
        outcome.stages,
        vec![
            Stage::Scanned,
            Stage::Rewritten,
            Stage::SyntaxChecked,
            Stage::NeedsEscalation,
            Stage::Rewritten,
            Stage::SyntaxChecked,
            Stage::AiConverted
        ]
    );
    assert_eq!(validator.calls.load(Ordering::SeqCst), 2);

    let requests = ai.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].dialect, SourceDialect::Hive);
    assert_eq!(requests[0].original, "SELECT score_risk(a) AS risk FROM t");
    assert_eq!(requests[0].reason, UNRESOLVED);
    assert!(!requests[0].hints.is_empty());
}

#[tokio::test]
async fn test_udf_statement_with_invalid_candidate_needs_review() {
    let validator = Arc::new(FakeValidator::rejecting("score_risk", UNRESOLVED));
    let ai = Arc::new(FakeAi::answering("SELECT score_risk_v2(a) AS risk FROM t"));
    let orch = orchestrator().with_validator(validator).with_ai(ai.clone());
    let (stmt, udfs) = statement(UDF_SCRIPT, SourceDialect::Hive, 1);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::ManualReviewFlagged);
    assert!(outcome
        .root_causes
        .contains(&RootCause::UdfDependencyUnresolved));
    // the rejected candidate is not adopted
    assert_eq!(outcome.final_sql, "SELECT score_risk(a) AS risk FROM t");
    // one escalation round only
    assert_eq!(ai.requests.lock().unwrap().len(), 1);
    assert_eq!(*outcome.stages.last().unwrap(), Stage::ManualReviewFlagged);
}

#[tokio::test]
async fn test_udf_statement_without_ai_needs_review() {
    let validator = Arc::new(FakeValidator::rejecting("score_risk", UNRESOLVED));
    let orch = orchestrator().with_validator(validator);
    let (stmt, udfs) = statement(UDF_SCRIPT, SourceDialect::Hive, 1);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::ManualReviewFlagged);
    assert_eq!(
        outcome.root_causes,
        BTreeSet::from([RootCause::UdfDependencyUnresolved])
    );
    assert!(outcome
        .notes
        .iter()
        .any(|n| n.contains("AI conversion is disabled")));
}

#[tokio::test]
async fn test_placeholder_definition_is_tagged() {
    let (stmt, udfs) = statement(UDF_SCRIPT, SourceDialect::Hive, 0);
    let outcome = orchestrator().convert(&stmt, &udfs).await;
    assert_eq!(outcome.name, "score_risk");
    assert!(outcome.final_sql.contains("CREATE OR REPLACE FUNCTION score_risk"));
    assert!(outcome
        .root_causes
        .contains(&RootCause::UdfDependencyUnresolved));
}

#[tokio::test]
async fn test_udf_call_escalates_even_when_syntax_passes() {
    let validator = Arc::new(FakeValidator::accepting());
    let ai = Arc::new(FakeAi::answering("SELECT CAST(a AS DOUBLE) AS risk FROM t"));
    let orch = orchestrator().with_validator(validator).with_ai(ai.clone());
    let (stmt, udfs) = statement(UDF_SCRIPT, SourceDialect::Hive, 1);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::AiConverted);
    assert_eq!(outcome.final_sql, "SELECT CAST(a AS DOUBLE) AS risk FROM t");
    assert!(outcome.root_causes.is_empty());

    let requests = ai.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].reason.contains("score_risk"));
}

#[tokio::test]
async fn test_udf_call_without_ai_needs_review_when_syntax_passes() {
    let orch = orchestrator().with_validator(Arc::new(FakeValidator::accepting()));
    let (stmt, udfs) = statement(UDF_SCRIPT, SourceDialect::Hive, 1);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::ManualReviewFlagged);
    assert_eq!(
        outcome.root_causes,
        BTreeSet::from([RootCause::UdfDependencyUnresolved])
    );
}

#[tokio::test]
async fn test_candidate_still_calling_udf_needs_review() {
    let ai = Arc::new(FakeAi::answering("SELECT score_risk(a) + 0 AS risk FROM t"));
    let orch = orchestrator()
        .with_validator(Arc::new(FakeValidator::accepting()))
        .with_ai(ai);
    let (stmt, udfs) = statement(UDF_SCRIPT, SourceDialect::Hive, 1);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::ManualReviewFlagged);
    assert!(outcome
        .notes
        .iter()
        .any(|n| n.contains("still calls an unresolved UDF")));
}

// ── Offline validation ──

#[tokio::test]
async fn test_offline_validator_accepts_rewritten_hive_ddl() {
    let orch = orchestrator().with_validator(Arc::new(OfflineValidator::new()));
    let (stmt, udfs) = statement(
        "CREATE TABLE t (a INT) STORED AS ORC",
        SourceDialect::Hive,
        0,
    );

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::AutoFixed);
    assert_eq!(outcome.final_sql, "CREATE TABLE t (a INT) USING ICEBERG");
    assert!(outcome.root_causes.is_empty());
}

#[tokio::test]
async fn test_offline_validator_accepts_udf_placeholder() {
    let orch = orchestrator().with_validator(Arc::new(OfflineValidator::new()));
    let (stmt, udfs) = statement(UDF_SCRIPT, SourceDialect::Hive, 0);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::AutoFixed);
    assert!(!outcome
        .root_causes
        .contains(&RootCause::SyntaxUnsupportedConstruct));
    assert_eq!(
        outcome.root_causes,
        BTreeSet::from([RootCause::UdfDependencyUnresolved])
    );
}

// ── Service errors ──

#[tokio::test]
async fn test_ai_error_needs_review() {
    let validator = Arc::new(FakeValidator::rejecting("score_risk", UNRESOLVED));
    let ai = Arc::new(FakeAi::failing("HTTP 403: invalid token"));
    let orch = orchestrator().with_validator(validator).with_ai(ai);
    let (stmt, udfs) = statement(UDF_SCRIPT, SourceDialect::Hive, 1);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::ManualReviewFlagged);
    assert!(outcome
        .root_causes
        .contains(&RootCause::ExternalServiceError));
    assert!(outcome
        .root_causes
        .contains(&RootCause::UdfDependencyUnresolved));
    assert!(outcome.notes.iter().any(|n| n.contains("invalid token")));
}

#[tokio::test]
async fn test_validator_outage_is_retried_then_reviewed() {
    let validator = Arc::new(FakeValidator::down());
    let orch = orchestrator().with_validator(validator.clone());
    let (stmt, udfs) = statement("SELECT 1", SourceDialect::Trino, 0);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::ManualReviewFlagged);
    assert_eq!(
        outcome.root_causes,
        BTreeSet::from([RootCause::ExternalServiceError])
    );
    // first attempt plus one retry
    assert_eq!(validator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_syntax_rejection_is_classified() {
    let validator = Arc::new(FakeValidator::rejecting(
        "FROM",
        "[PARSE_SYNTAX_ERROR] Syntax error at or near 'FROM'",
    ));
    let orch = orchestrator().with_validator(validator);
    let (stmt, udfs) = statement("SELECT a FROM t", SourceDialect::Trino, 0);

    let outcome = orch.convert(&stmt, &udfs).await;
    assert_eq!(outcome.kind, OutcomeKind::ManualReviewFlagged);
    assert_eq!(
        outcome.root_causes,
        BTreeSet::from([RootCause::SyntaxUnsupportedConstruct])
    );
    assert!(outcome.notes[0].starts_with("syntax check failed: [PARSE_SYNTAX_ERROR]"));
}
