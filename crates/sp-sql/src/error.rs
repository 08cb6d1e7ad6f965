//! Error types for sp-sql

use thiserror::Error;

/// Rule catalog and rewrite errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    /// Rule ordering contains a cycle (S001)
    #[error("[S001] Circular dependency between rewrite rules: {cycle}")]
    CatalogCycle { cycle: String },

    /// A rule declares a dependency on a rule that does not exist (S002)
    #[error("[S002] Rewrite rule '{rule}' must follow unknown rule '{dependency}'")]
    UnknownDependency { rule: String, dependency: String },

    /// Two rules share a name (S003)
    #[error("[S003] Duplicate rewrite rule name: {name}")]
    DuplicateRule { name: String },

    /// Rewrite passes hit the ceiling (S004)
    #[error("[S004] Rewrite did not converge after {passes} passes")]
    DidNotConverge { passes: usize },

    /// Pass ceiling must allow at least one pass (S005)
    #[error("[S005] Rewrite pass ceiling must be at least 1")]
    InvalidPassCeiling,
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;
