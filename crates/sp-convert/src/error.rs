//! Error types for sp-convert

use sp_sql::SqlError;
use thiserror::Error;

/// Failures outside any single statement: discovery and artifact IO.
///
/// Statement-level problems are recorded on their outcome instead.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Source directory missing (C001)
    #[error("[C001] Source directory not found: {path}")]
    SourceDirNotFound { path: String },

    /// Reading a source unit or outcome record failed (C002)
    #[error("[C002] Failed to read {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing an output artifact failed (C003)
    #[error("[C003] Failed to write {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An outcome record could not be (de)serialized (C004)
    #[error("[C004] Invalid outcome record {path}: {source}")]
    InvalidRecord {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The rule catalog or engine could not be built (C005)
    #[error("[C005] Rule catalog failed to load: {0}")]
    Catalog(#[from] SqlError),

    /// Two source files map to the same unit name (C006)
    #[error("[C006] Duplicate source unit '{name}': {first} and {second}")]
    DuplicateUnit {
        name: String,
        first: String,
        second: String,
    },
}

/// Result type alias for ConvertError
pub type ConvertResult<T> = Result<T, ConvertError>;
