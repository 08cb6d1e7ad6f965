//! Offline syntax validation with sqlparser

use crate::error::CapabilityResult;
use crate::traits::{SyntaxValidator, SyntaxVerdict};
use async_trait::async_trait;
use sqlparser::dialect::{DatabricksDialect, Dialect, GenericDialect, HiveDialect};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Databricks table clauses sqlparser does not model
const TABLE_CLAUSES: &[&str] = &[
    "CLUSTER",
    "COMMENT",
    "LOCATION",
    "OPTIONS",
    "PARTITIONED",
    "TBLPROPERTIES",
    "USING",
];

/// Parses statements with sqlparser.
///
/// Used when no warehouse is reachable (`--offline`). A statement passes if
/// the Databricks, Hive or generic dialect accepts it. DDL the parser only
/// partly models is reduced first: a `CREATE TABLE` is checked without its
/// Databricks table clauses and a SQL `CREATE FUNCTION` by its `RETURN`
/// expression. Anything that only fails at planning time still passes, so
/// its verdicts are a fallback rather than the gate.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineValidator;

impl OfflineValidator {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous check, shared by the trait impl and tests
    pub fn check(&self, sql: &str) -> SyntaxVerdict {
        let message = match parse_any(sql) {
            Ok(()) => return SyntaxVerdict::Valid,
            Err(message) => message,
        };
        let message = match reduced_ddl(sql) {
            Some(reduced) => match parse_any(&reduced) {
                Ok(()) => return SyntaxVerdict::Valid,
                Err(reduced_message) => reduced_message,
            },
            None => message,
        };
        // sqlparser errors carry "... at Line: X, Column: Y" in the text
        let message = match parse_location(&message) {
            Some((line, column)) => format!("{} (line {}, column {})", message, line, column),
            None => message,
        };
        SyntaxVerdict::Invalid { message }
    }
}

/// Parse with each dialect in turn; the Databricks error wins on failure
fn parse_any(sql: &str) -> Result<(), String> {
    let dialects: [&dyn Dialect; 3] = [&DatabricksDialect {}, &HiveDialect {}, &GenericDialect {}];
    let mut first_error = None;
    for dialect in dialects {
        match Parser::parse_sql(dialect, sql) {
            Ok(_) => return Ok(()),
            Err(e) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }
    Err(first_error.unwrap_or_default())
}

/// The part of a DDL statement sqlparser can check, if the statement is one
/// it only partly models
fn reduced_ddl(sql: &str) -> Option<String> {
    let tokens = Tokenizer::new(&DatabricksDialect {}, sql).tokenize().ok()?;
    let mut significant = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)));
    if !significant.next().is_some_and(|t| is_word(t, "CREATE")) {
        return None;
    }
    let lead: Vec<&Token> = significant.take(4).collect();

    if lead.iter().any(|t| is_word(t, "FUNCTION")) {
        let ret = top_level_word(&tokens, 0, &["RETURN"])?;
        let body = render(&tokens[ret + 1..]);
        let body = body.trim();
        let is_query = ["SELECT", "WITH", "("]
            .iter()
            .any(|p| body.len() >= p.len() && body[..p.len()].eq_ignore_ascii_case(p));
        return Some(if is_query {
            body.to_string()
        } else {
            format!("SELECT {}", body)
        });
    }

    if lead.iter().any(|t| is_word(t, "TABLE")) {
        let cut = top_level_word(&tokens, 0, TABLE_CLAUSES)?;
        let mut reduced = render(&tokens[..cut]);
        // keep the query of a CTAS
        if let Some(as_idx) = top_level_word(&tokens, cut, &["AS"]) {
            reduced.push_str(&render(&tokens[as_idx..]));
        }
        return Some(reduced);
    }
    None
}

fn is_word(token: &Token, word: &str) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(word))
}

/// First bracket-depth-zero bare word from `words`, at or after `from`
fn top_level_word(tokens: &[Token], from: usize, words: &[&str]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ if i >= from && depth == 0 && words.iter().any(|w| is_word(token, w)) => {
                return Some(i)
            }
            _ => {}
        }
    }
    None
}

fn render(tokens: &[Token]) -> String {
    tokens.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl SyntaxValidator for OfflineValidator {
    async fn validate(&self, sql: &str) -> CapabilityResult<SyntaxVerdict> {
        Ok(self.check(sql))
    }

    fn name(&self) -> &'static str {
        "sqlparser (offline)"
    }
}

/// Line and column from a sqlparser error message, when present
pub(crate) fn parse_location(msg: &str) -> Option<(usize, usize)> {
    let line_start = msg.find("Line: ")? + 6;
    let comma = msg[line_start..].find(',')?;
    let line = msg[line_start..line_start + comma].trim().parse().ok()?;

    let col_start = msg.find("Column: ")? + 8;
    let col_end = msg[col_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| col_start + i)
        .unwrap_or(msg.len());
    let column = msg[col_start..col_end].trim().parse().ok()?;
    Some((line, column))
}

#[cfg(test)]
#[path = "local_test.rs"]
mod tests;
