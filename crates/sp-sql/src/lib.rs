//! sp-sql - SQL rewrite layer for Sparkport
//!
//! This crate provides a structure-preserving lexer, a statement splitter,
//! the ordered rewrite rule catalog and its fixed-point engine, and the
//! semantic issue detector that runs over rewritten statements. Everything
//! here is pure and synchronous.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod matcher;
pub mod rules;
pub mod semantic;
pub mod splitter;
pub mod token;
pub mod udf;

pub use catalog::{RewriteRule, RuleCatalog};
pub use engine::{replay, RewriteEngine, RewriteOutput, DEFAULT_MAX_PASSES};
pub use error::{SqlError, SqlResult};
pub use lexer::{tokenize, tokenize_target};
pub use semantic::{SemanticDetector, SemanticPattern};
pub use splitter::{split, Segment, SourceUnit, Statement};
pub use token::{Token, TokenKind};
pub use udf::{declared_temporary_functions, referenced_functions, temporary_function_name};
