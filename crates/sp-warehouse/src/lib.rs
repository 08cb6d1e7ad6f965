//! sp-warehouse - external capabilities for Sparkport
//!
//! This crate defines the ports the conversion pipeline calls when its own
//! rules are not enough (syntax validation, query execution, AI-assisted
//! conversion), a timeout and bounded-retry wrapper for those calls, the
//! Databricks SQL Statement Execution client that implements all three, and
//! an offline sqlparser validator.

pub mod databricks;
pub mod error;
pub mod local;
pub mod retry;
pub mod traits;

pub use databricks::{DatabricksClient, DatabricksSettings};
pub use error::{CapabilityError, CapabilityResult};
pub use local::OfflineValidator;
pub use retry::{with_retry, RetryPolicy};
pub use traits::{AiConverter, ConversionRequest, QueryExecutor, SyntaxValidator, SyntaxVerdict};
