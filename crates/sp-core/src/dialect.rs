//! Source dialect tag carried by every statement

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// SQL dialect a source unit is written in.
///
/// The tag selects the rule catalog subset and a few lexical conventions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceDialect {
    /// HiveQL
    #[default]
    Hive,
    /// Trino / Presto SQL
    Trino,
}

impl SourceDialect {
    /// All supported source dialects
    pub const ALL: [SourceDialect; 2] = [SourceDialect::Hive, SourceDialect::Trino];

    /// Whether `"..."` denotes a string literal (Hive) rather than a quoted identifier
    pub fn double_quote_is_string(self) -> bool {
        matches!(self, SourceDialect::Hive)
    }

    /// Whether a backslash escapes the next character inside string literals
    pub fn backslash_escapes(self) -> bool {
        matches!(self, SourceDialect::Hive)
    }

    /// Guess the dialect from a file extension, if it is unambiguous
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "hql" | "hive" => Some(SourceDialect::Hive),
            "trino" | "presto" => Some(SourceDialect::Trino),
            _ => None,
        }
    }

    /// Lowercase name used in config files and reports
    pub fn as_str(self) -> &'static str {
        match self {
            SourceDialect::Hive => "hive",
            SourceDialect::Trino => "trino",
        }
    }
}

impl fmt::Display for SourceDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceDialect {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hive" | "hql" => Ok(SourceDialect::Hive),
            "trino" | "presto" => Ok(SourceDialect::Trino),
            _ => Err(CoreError::UnknownDialect {
                name: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "dialect_test.rs"]
mod tests;
