//! Sparkport core library
//!
//! Shared types for the conversion pipeline: the source dialect tag, the
//! per-statement outcome record, the run report, and `sparkport.yml`
//! configuration.

pub mod config;
pub mod dialect;
pub mod error;
pub mod outcome;
pub mod report;
pub mod serde_helpers;

pub use config::Config;
pub use dialect::SourceDialect;
pub use error::{CoreError, CoreResult};
pub use outcome::{
    ConversionOutcome, ExecutionVerdict, FailureReason, OutcomeKind, RootCause, SemanticFlag,
    Severity, Span, Stage, Transformation,
};
pub use report::{ConversionReport, ExecutionSummary};
