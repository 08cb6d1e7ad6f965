//! Capability ports the conversion pipeline calls out to

use crate::error::CapabilityResult;
use async_trait::async_trait;
use sp_core::{ExecutionVerdict, SourceDialect};

/// Service names used in errors and logs
pub const SYNTAX_VALIDATOR: &str = "syntax validator";
pub const QUERY_EXECUTOR: &str = "query executor";
pub const AI_CONVERTER: &str = "AI converter";

/// Answer of a syntax check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxVerdict {
    Valid,
    Invalid { message: String },
}

impl SyntaxVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, SyntaxVerdict::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            SyntaxVerdict::Valid => None,
            SyntaxVerdict::Invalid { message } => Some(message),
        }
    }
}

/// Input to the AI-assisted conversion capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub dialect: SourceDialect,
    /// Statement as written in the source dialect
    pub original: String,
    /// Best rule-based rewrite so far
    pub rewritten: String,
    /// Validation error text, or the semantic flags that triggered escalation
    pub reason: String,
    /// Known conversions for the dialect, passed along as guidance
    pub hints: Vec<String>,
}

/// Checks a statement without executing it
#[async_trait]
pub trait SyntaxValidator: Send + Sync {
    async fn validate(&self, sql: &str) -> CapabilityResult<SyntaxVerdict>;

    /// Validator name for logging
    fn name(&self) -> &'static str;
}

/// Executes a statement against the target warehouse
///
/// A statement the warehouse refuses is `Ok(ExecutionVerdict::Fail)`;
/// errors are reserved for the service itself misbehaving.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> CapabilityResult<ExecutionVerdict>;
}

/// Produces a candidate target-dialect statement
#[async_trait]
pub trait AiConverter: Send + Sync {
    async fn convert(&self, request: &ConversionRequest) -> CapabilityResult<String>;
}
