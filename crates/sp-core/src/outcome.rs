//! Per-statement conversion records: transformations, semantic flags, outcomes

use crate::dialect::SourceDialect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Byte range `[start, end)` into a statement's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when the two ranges share at least one byte
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `other` lies entirely within this span
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// One rule application recorded in a statement's audit log.
///
/// `span` is expressed in the coordinates of the statement text as it was
/// when the rule ran, so replaying the log in order reproduces the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    /// Rule that produced this edit
    pub rule: String,
    /// Pass number (1-based) in which the rule ran
    pub pass: usize,
    /// Replaced byte range
    pub span: Span,
    /// Text that was replaced
    pub original: String,
    /// Text written in its place
    pub replacement: String,
}

/// How a semantic flag should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// A restructuring is known; it is suggested but never applied automatically
    AutoFixable,
    /// Needs a human to decide what the query meant
    ManualReviewRequired,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::AutoFixable => write!(f, "auto-fixable"),
            Severity::ManualReviewRequired => write!(f, "manual review required"),
        }
    }
}

/// Advisory marker for a syntactically valid but semantically suspect shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticFlag {
    /// Stable pattern identifier (e.g. `distinct-with-window`)
    pub pattern: String,
    pub severity: Severity,
    /// Location in the rewritten statement text
    pub span: Span,
    /// Human-readable explanation
    pub explanation: String,
    /// Suggested restructuring, present for auto-fixable flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl SemanticFlag {
    pub fn requires_review(&self) -> bool {
        self.severity == Severity::ManualReviewRequired
    }
}

/// Final classification of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    AutoFixed,
    AiConverted,
    ManualReviewFlagged,
    Failed,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 4] = [
        OutcomeKind::AutoFixed,
        OutcomeKind::AiConverted,
        OutcomeKind::ManualReviewFlagged,
        OutcomeKind::Failed,
    ];

    /// Upper-case label used in rendered SQL headers
    pub fn label(self) -> &'static str {
        match self {
            OutcomeKind::AutoFixed => "AUTO FIXED",
            OutcomeKind::AiConverted => "AI CONVERTED",
            OutcomeKind::ManualReviewFlagged => "MANUAL REVIEW",
            OutcomeKind::Failed => "FAILED",
        }
    }

    /// Whether the statement is eligible for the execution pass
    pub fn is_executable(self) -> bool {
        matches!(self, OutcomeKind::AutoFixed | OutcomeKind::AiConverted)
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::AutoFixed => write!(f, "auto_fixed"),
            OutcomeKind::AiConverted => write!(f, "ai_converted"),
            OutcomeKind::ManualReviewFlagged => write!(f, "manual_review_flagged"),
            OutcomeKind::Failed => write!(f, "failed"),
        }
    }
}

/// Categorised reason a statement needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    SyntaxUnsupportedConstruct,
    SemanticallyInvalidPattern,
    UdfDependencyUnresolved,
    DataQualityIssue,
    TypeMismatch,
    ExternalServiceError,
    RewriteDidNotConverge,
}

impl RootCause {
    pub const ALL: [RootCause; 7] = [
        RootCause::SyntaxUnsupportedConstruct,
        RootCause::SemanticallyInvalidPattern,
        RootCause::UdfDependencyUnresolved,
        RootCause::DataQualityIssue,
        RootCause::TypeMismatch,
        RootCause::ExternalServiceError,
        RootCause::RewriteDidNotConverge,
    ];
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RootCause::SyntaxUnsupportedConstruct => "syntax_unsupported_construct",
            RootCause::SemanticallyInvalidPattern => "semantically_invalid_pattern",
            RootCause::UdfDependencyUnresolved => "udf_dependency_unresolved",
            RootCause::DataQualityIssue => "data_quality_issue",
            RootCause::TypeMismatch => "type_mismatch",
            RootCause::ExternalServiceError => "external_service_error",
            RootCause::RewriteDidNotConverge => "rewrite_did_not_converge",
        };
        f.write_str(s)
    }
}

/// Why a statement ended `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Unterminated literal or comment
    Unparseable { message: String },
    /// Rewrite passes hit the ceiling
    RewriteDidNotConverge { passes: usize },
    /// The run was cancelled before this statement was dispatched
    Cancelled,
    /// The worker processing this statement died
    Internal { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Unparseable { message } => write!(f, "unparseable: {}", message),
            FailureReason::RewriteDidNotConverge { passes } => {
                write!(f, "rewrite did not converge after {} passes", passes)
            }
            FailureReason::Cancelled => write!(f, "run cancelled before dispatch"),
            FailureReason::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

/// Result of the optional execution pass
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ExecutionVerdict {
    Pass,
    Fail { message: String },
    #[default]
    Unknown,
}

/// Orchestrator states, recorded in order as a statement moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scanned,
    Rewritten,
    SyntaxChecked,
    AutoFixed,
    NeedsEscalation,
    AiConverted,
    ManualReviewFlagged,
    ExecutionChecked,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Everything known about one statement after conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Source unit identifier (file stem)
    pub unit: String,
    /// 0-based statement index within the unit
    pub index: usize,
    /// Display name (created object or `query_N`)
    pub name: String,
    pub dialect: SourceDialect,
    pub kind: OutcomeKind,
    /// Original statement text
    pub original_sql: String,
    /// Best available candidate
    pub final_sql: String,
    #[serde(default)]
    pub transformations: Vec<Transformation>,
    #[serde(default)]
    pub flags: Vec<SemanticFlag>,
    #[serde(default)]
    pub root_causes: BTreeSet<RootCause>,
    /// Causes the last execution added to `root_causes`
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub execution_causes: BTreeSet<RootCause>,
    /// Free-form notes (validation errors, escalation results)
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    #[serde(default)]
    pub verdict: ExecutionVerdict,
    /// States visited, in order
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl ConversionOutcome {
    /// Stable key identifying the statement within a run
    pub fn key(&self) -> (&str, usize) {
        (&self.unit, self.index)
    }

    /// Whether the rendered artifact must carry an attention marker
    pub fn needs_attention(&self) -> bool {
        matches!(
            self.kind,
            OutcomeKind::ManualReviewFlagged | OutcomeKind::Failed
        ) || !self.root_causes.is_empty()
            || self.flags.iter().any(SemanticFlag::requires_review)
    }
}
