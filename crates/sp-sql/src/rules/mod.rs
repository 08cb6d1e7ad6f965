//! Built-in rewrite rules, Hive and Trino to Databricks SQL

mod common;
mod hive;
mod trino;

use crate::catalog::RewriteRule;
use crate::matcher::{Cursor, Edit, RuleMatch};
use crate::token::Token;
use sp_core::SourceDialect;

pub(crate) const HIVE: &[SourceDialect] = &[SourceDialect::Hive];
pub(crate) const TRINO: &[SourceDialect] = &[SourceDialect::Trino];
pub(crate) const ALL_DIALECTS: &[SourceDialect] = &SourceDialect::ALL;

/// Every built-in rule, in declaration order (the catalog orders them)
pub fn builtin_rules() -> Vec<RewriteRule> {
    let mut rules = common::rules();
    rules.extend(hive::rules());
    rules.extend(trino::rules());
    rules
}

/// `from(` → `to(`, keeping the argument list verbatim
pub(crate) fn rename_call(tokens: &[Token], pos: usize, from: &str, to: &str) -> Option<RuleMatch> {
    if !tokens[pos].is_word_ci(from) || is_member_access(tokens, pos) {
        return None;
    }
    Cursor::new(tokens, pos + 1).group()?;
    Some(RuleMatch::single(Edit::replace(pos, pos + 1, to)))
}

/// Bare word at `pos` → `to`
pub(crate) fn rename_word(tokens: &[Token], pos: usize, from: &str, to: &str) -> Option<RuleMatch> {
    if !tokens[pos].is_word_ci(from) || is_member_access(tokens, pos) {
        return None;
    }
    Some(RuleMatch::single(Edit::replace(pos, pos + 1, to)))
}

/// `x.<pos>`: a column or field named like a keyword, not a keyword
fn is_member_access(tokens: &[Token], pos: usize) -> bool {
    pos > 0 && tokens[pos - 1].is_punct(".")
}

#[cfg(test)]
#[path = "hive_test.rs"]
mod hive_tests;

#[cfg(test)]
#[path = "trino_test.rs"]
mod trino_tests;
