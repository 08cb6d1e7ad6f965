//! Escalation orchestrator: drives one statement from scan to final outcome.
//!
//! ```text
//! Scanned -> Rewritten -> SyntaxChecked -> AutoFixed
//!                                       \-> NeedsEscalation -> Rewritten (AI candidate)
//!                                                           -> SyntaxChecked -> AiConverted
//!                                                                            \-> ManualReviewFlagged
//! ```
//!
//! Unparseable and non-converging statements go straight to `Failed`. There
//! is at most one escalation round per statement.

use crate::classify::classify_message;
use sp_core::{
    ConversionOutcome, ExecutionVerdict, FailureReason, OutcomeKind, RootCause, SemanticFlag,
    Stage,
};
use sp_sql::lexer::{render, tokenize_target};
use sp_sql::matcher::ctas_as;
use sp_sql::udf::{referenced_functions, temporary_function_name};
use sp_sql::{RewriteEngine, SemanticDetector, SqlError, Statement};
use sp_warehouse::traits::{AI_CONVERTER, SYNTAX_VALIDATOR};
use sp_warehouse::{
    with_retry, AiConverter, CapabilityError, ConversionRequest, RetryPolicy, SyntaxValidator,
    SyntaxVerdict,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Characters of an escalation reason kept in outcome notes
const NOTE_REASON_CHARS: usize = 200;

/// Converts statements using the rule engine, the semantic detector and the
/// configured external capabilities
pub struct Orchestrator {
    engine: RewriteEngine,
    detector: SemanticDetector,
    validator: Option<Arc<dyn SyntaxValidator>>,
    ai: Option<Arc<dyn AiConverter>>,
    policy: RetryPolicy,
}

/// Result of one syntax gate
enum Gate {
    Passed,
    Rejected(String),
    Unavailable(CapabilityError),
    Skipped,
}

impl Orchestrator {
    pub fn new(engine: RewriteEngine) -> Self {
        Self {
            engine,
            detector: SemanticDetector::builtin(),
            validator: None,
            ai: None,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn SyntaxValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_ai(mut self, ai: Arc<dyn AiConverter>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_detector(mut self, detector: SemanticDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn engine(&self) -> &RewriteEngine {
        &self.engine
    }

    /// Convert one statement.
    ///
    /// `unit_functions` holds the temporary functions declared anywhere in
    /// the statement's unit. Never fails: every problem is recorded on the
    /// returned outcome.
    pub async fn convert(
        &self,
        statement: &Statement,
        unit_functions: &BTreeSet<String>,
    ) -> ConversionOutcome {
        let mut outcome = scanned(statement);

        if let Some(message) = statement.unparseable_reason() {
            log::warn!("{}: {}", outcome.name, message);
            outcome.root_causes.insert(RootCause::SyntaxUnsupportedConstruct);
            return fail(outcome, FailureReason::Unparseable { message });
        }

        let rewrite = match self.engine.rewrite_statement(statement) {
            Ok(rewrite) => rewrite,
            Err(SqlError::DidNotConverge { passes }) => {
                log::warn!("{}: rewrite did not converge", outcome.name);
                outcome.root_causes.insert(RootCause::RewriteDidNotConverge);
                return fail(outcome, FailureReason::RewriteDidNotConverge { passes });
            }
            Err(e) => {
                return fail(
                    outcome,
                    FailureReason::Internal {
                        message: e.to_string(),
                    },
                )
            }
        };
        outcome.stages.push(Stage::Rewritten);
        outcome.final_sql = rewrite.sql.clone();
        outcome.transformations = rewrite.transformations;

        let functions = referenced_functions(&statement.tokens, unit_functions);
        if !functions.is_empty() {
            outcome.root_causes.insert(RootCause::UdfDependencyUnresolved);
            outcome.notes.push(format!(
                "depends on Hive UDF {} with no Databricks implementation yet",
                join_names(&functions)
            ));
        }
        // callers escalate; the placeholder definition carries its own TODO
        let mut pending_udfs = functions;
        if let Some(own) = temporary_function_name(&statement.tokens) {
            pending_udfs.remove(&own);
        }

        if outcome.final_sql.trim().is_empty() {
            outcome
                .notes
                .push("statement removed: not needed on Databricks".to_string());
            return finish(outcome, OutcomeKind::AutoFixed);
        }

        outcome.flags = self.detector.detect(&outcome.final_sql);
        if !outcome.flags.is_empty() {
            outcome.root_causes.insert(RootCause::SemanticallyInvalidPattern);
        }

        let gate = self.check_syntax(&outcome.final_sql).await;
        if !matches!(gate, Gate::Skipped) {
            outcome.stages.push(Stage::SyntaxChecked);
        }
        let manual = outcome.flags.iter().any(SemanticFlag::requires_review);

        let escalation = match gate {
            Gate::Passed | Gate::Skipped if !manual && pending_udfs.is_empty() => {
                return finish(outcome, OutcomeKind::AutoFixed);
            }
            Gate::Passed | Gate::Skipped => {
                let mut reasons = Vec::new();
                if !pending_udfs.is_empty() {
                    reasons.push(format!(
                        "depends on unresolved UDF {}",
                        join_names(&pending_udfs)
                    ));
                }
                if manual {
                    reasons.push(flag_summary(&outcome.flags));
                }
                Escalation {
                    reason: reasons.join("; "),
                    rejection: None,
                }
            }
            Gate::Rejected(message) => {
                outcome
                    .notes
                    .push(format!("syntax check failed: {}", truncate(&message)));
                Escalation {
                    reason: message.clone(),
                    rejection: Some(message),
                }
            }
            Gate::Unavailable(err) => {
                outcome.root_causes.insert(RootCause::ExternalServiceError);
                outcome.notes.push(format!("syntax check unavailable: {}", err));
                return manual_review(outcome, None);
            }
        };

        outcome.stages.push(Stage::NeedsEscalation);
        self.escalate(statement, unit_functions, outcome, escalation)
            .await
    }

    /// One escalation round through the AI capability
    async fn escalate(
        &self,
        statement: &Statement,
        unit_functions: &BTreeSet<String>,
        mut outcome: ConversionOutcome,
        escalation: Escalation,
    ) -> ConversionOutcome {
        let Escalation { reason, rejection } = escalation;
        let Some(ai) = &self.ai else {
            outcome
                .notes
                .push("escalation skipped: AI conversion is disabled".to_string());
            return manual_review(outcome, rejection.as_deref());
        };

        let request = ConversionRequest {
            dialect: statement.dialect,
            original: outcome.original_sql.clone(),
            rewritten: outcome.final_sql.clone(),
            reason: reason.clone(),
            hints: self
                .engine
                .catalog()
                .for_dialect(statement.dialect)
                .map(|rule| rule.rationale.to_string())
                .collect(),
        };
        log::debug!("{}: escalating to {}", outcome.name, AI_CONVERTER);
        let candidate =
            match with_retry(&self.policy, AI_CONVERTER, || ai.convert(&request)).await {
                Ok(candidate) => candidate,
                Err(err) => {
                    outcome.root_causes.insert(RootCause::ExternalServiceError);
                    outcome.notes.push(format!("AI conversion failed: {}", err));
                    return manual_review(outcome, rejection.as_deref());
                }
            };

        // the candidate re-enters at Rewritten for exactly one more check
        outcome.stages.push(Stage::Rewritten);
        let candidate_flags = self.detector.detect(&candidate);
        let gate = self.check_syntax(&candidate).await;
        if !matches!(gate, Gate::Skipped) {
            outcome.stages.push(Stage::SyntaxChecked);
        }

        match gate {
            Gate::Passed | Gate::Skipped => {
                // a syntactically valid candidate replaces the rule-based rewrite
                adopt_candidate(&mut outcome, candidate, candidate_flags, unit_functions);
                if outcome.flags.iter().any(SemanticFlag::requires_review) {
                    outcome
                        .notes
                        .push("AI candidate still matches a semantic pattern".to_string());
                    return manual_review(outcome, None);
                }
                if outcome
                    .root_causes
                    .contains(&RootCause::UdfDependencyUnresolved)
                {
                    outcome
                        .notes
                        .push("AI candidate still calls an unresolved UDF".to_string());
                    return manual_review(outcome, None);
                }
                outcome
                    .notes
                    .push(format!("converted by AI after: {}", truncate(&reason)));
                finish(outcome, OutcomeKind::AiConverted)
            }
            Gate::Rejected(message) => {
                outcome.notes.push(format!(
                    "AI candidate failed syntax check: {}",
                    truncate(&message)
                ));
                manual_review(outcome, Some(&message))
            }
            Gate::Unavailable(err) => {
                outcome.root_causes.insert(RootCause::ExternalServiceError);
                outcome
                    .notes
                    .push(format!("syntax check of AI candidate unavailable: {}", err));
                manual_review(outcome, rejection.as_deref())
            }
        }
    }

    /// Syntax-check a statement; for a CTAS only its query is explained
    async fn check_syntax(&self, sql: &str) -> Gate {
        let Some(validator) = &self.validator else {
            return Gate::Skipped;
        };
        let target = explain_target(sql);
        log::debug!("syntax check via {}", validator.name());
        match with_retry(&self.policy, SYNTAX_VALIDATOR, || validator.validate(&target)).await {
            Ok(SyntaxVerdict::Valid) => Gate::Passed,
            Ok(SyntaxVerdict::Invalid { message }) => Gate::Rejected(message),
            Err(err) => Gate::Unavailable(err),
        }
    }
}

/// Why a statement was escalated
struct Escalation {
    /// Sent to the AI converter
    reason: String,
    /// Validator message, when the syntax check rejected the rewrite
    rejection: Option<String>,
}

/// Replace the rewrite with a valid AI candidate and recompute the tags that
/// depend on the statement text
fn adopt_candidate(
    outcome: &mut ConversionOutcome,
    candidate: String,
    flags: Vec<SemanticFlag>,
    unit_functions: &BTreeSet<String>,
) {
    outcome.final_sql = candidate;
    outcome.flags = flags;
    if outcome.flags.is_empty() {
        outcome
            .root_causes
            .remove(&RootCause::SemanticallyInvalidPattern);
    } else {
        outcome.root_causes.insert(RootCause::SemanticallyInvalidPattern);
    }
    let tokens = tokenize_target(&outcome.final_sql);
    if referenced_functions(&tokens, unit_functions).is_empty() {
        outcome.root_causes.remove(&RootCause::UdfDependencyUnresolved);
    } else {
        outcome.root_causes.insert(RootCause::UdfDependencyUnresolved);
    }
}

fn manual_review(mut outcome: ConversionOutcome, rejection: Option<&str>) -> ConversionOutcome {
    if let Some(message) = rejection {
        outcome.root_causes.insert(classify_message(message));
    }
    log::warn!("{}: routed to manual review", outcome.name);
    finish(outcome, OutcomeKind::ManualReviewFlagged)
}

/// Text sent to the syntax validator
pub fn explain_target(sql: &str) -> String {
    let tokens = tokenize_target(sql);
    match ctas_as(&tokens) {
        Some(as_idx) => render(&tokens[as_idx + 1..]).trim().to_string(),
        None => sql.trim().to_string(),
    }
}

fn scanned(statement: &Statement) -> ConversionOutcome {
    let text = statement.text();
    ConversionOutcome {
        unit: statement.unit.clone(),
        index: statement.index,
        name: statement.display_name(),
        dialect: statement.dialect,
        kind: OutcomeKind::Failed,
        original_sql: text.clone(),
        final_sql: text,
        transformations: Vec::new(),
        flags: Vec::new(),
        root_causes: BTreeSet::new(),
        execution_causes: BTreeSet::new(),
        notes: Vec::new(),
        failure: None,
        verdict: ExecutionVerdict::Unknown,
        stages: vec![Stage::Scanned],
    }
}

fn finish(mut outcome: ConversionOutcome, kind: OutcomeKind) -> ConversionOutcome {
    outcome.kind = kind;
    outcome.stages.push(match kind {
        OutcomeKind::AutoFixed => Stage::AutoFixed,
        OutcomeKind::AiConverted => Stage::AiConverted,
        OutcomeKind::ManualReviewFlagged => Stage::ManualReviewFlagged,
        OutcomeKind::Failed => Stage::Failed,
    });
    outcome
}

/// Outcome for a statement that ends `Failed` with the given reason
pub fn fail(mut outcome: ConversionOutcome, reason: FailureReason) -> ConversionOutcome {
    outcome.notes.push(reason.to_string());
    outcome.failure = Some(reason);
    finish(outcome, OutcomeKind::Failed)
}

/// `Failed` outcome for a statement that never reached the orchestrator
pub fn not_processed(statement: &Statement, reason: FailureReason) -> ConversionOutcome {
    fail(scanned(statement), reason)
}

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn flag_summary(flags: &[SemanticFlag]) -> String {
    flags
        .iter()
        .filter(|f| f.requires_review())
        .map(|f| format!("{}: {}", f.pattern, f.explanation))
        .collect::<Vec<_>>()
        .join("; ")
}

fn truncate(text: &str) -> String {
    let mut out: String = text.chars().take(NOTE_REASON_CHARS).collect();
    if out.len() < text.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
