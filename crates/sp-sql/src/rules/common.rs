//! Rules shared by both source dialects

use super::{rename_word, ALL_DIALECTS};
use crate::catalog::RewriteRule;
use crate::matcher::{Cursor, Edit, RuleMatch};
use crate::token::Token;

pub(super) fn rules() -> Vec<RewriteRule> {
    vec![
        RewriteRule {
            name: "varchar-to-string",
            dialects: ALL_DIALECTS,
            priority: 50,
            after: &[],
            rationale: "VARCHAR(n) becomes STRING; Databricks strings are unbounded",
            matcher: varchar_to_string,
        },
        RewriteRule {
            name: "interval-literal",
            dialects: ALL_DIALECTS,
            priority: 50,
            after: &[],
            rationale: "INTERVAL 'n' UNIT becomes INTERVAL n UNIT with a numeric quantity",
            matcher: interval_literal,
        },
    ]
}

fn varchar_to_string(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    let mut m = rename_word(tokens, pos, "VARCHAR", "STRING")?;
    let mut cursor = Cursor::new(tokens, pos + 1);
    if let Some(len) = cursor.group() {
        m.edits[0].end = len.close + 1;
    }
    Some(m)
}

const INTERVAL_UNITS: &[&str] = &[
    "YEAR", "YEARS", "MONTH", "MONTHS", "WEEK", "WEEKS", "DAY", "DAYS", "HOUR", "HOURS", "MINUTE",
    "MINUTES", "SECOND", "SECONDS",
];

fn interval_literal(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if !tokens[pos].is_word_ci("INTERVAL") {
        return None;
    }
    let mut cursor = Cursor::new(tokens, pos + 1);
    let quantity = cursor.string()?;
    cursor.any_word(INTERVAL_UNITS)?;

    let value = tokens[quantity].string_value()?;
    let value = value.trim();
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(RuleMatch::single(Edit::replace(
        quantity,
        quantity + 1,
        value.to_string(),
    )))
}
