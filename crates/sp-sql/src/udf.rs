//! Temporary function discovery and reference tracking

use crate::matcher::Cursor;
use crate::splitter::Statement;
use crate::token::Token;
use std::collections::BTreeSet;

/// Name of the function a `CREATE TEMPORARY FUNCTION` statement declares
pub fn temporary_function_name(tokens: &[Token]) -> Option<String> {
    let start = tokens.iter().position(Token::is_significant)?;
    if !tokens[start].is_word_ci("CREATE") {
        return None;
    }
    let mut cursor = Cursor::new(tokens, start + 1);
    cursor.any_word(&["TEMPORARY", "TEMP"])?;
    cursor.word("FUNCTION")?;
    let (_, last) = cursor.qualified_name()?;
    Some(tokens[last].ident_name())
}

/// Lowercase names of every temporary function declared in a unit
pub fn declared_temporary_functions<'a>(
    statements: impl IntoIterator<Item = &'a Statement>,
) -> BTreeSet<String> {
    statements
        .into_iter()
        .filter_map(|s| temporary_function_name(&s.tokens))
        .collect()
}

/// Names from `declared` that the statement calls or defines
pub fn referenced_functions(tokens: &[Token], declared: &BTreeSet<String>) -> BTreeSet<String> {
    if declared.is_empty() {
        return BTreeSet::new();
    }
    let sig: Vec<&Token> = tokens.iter().filter(|t| t.is_significant()).collect();
    let mut found = BTreeSet::new();
    for (i, tok) in sig.iter().enumerate() {
        if !(tok.is_word() || tok.is_quoted()) {
            continue;
        }
        let name = tok.ident_name();
        if !declared.contains(&name) {
            continue;
        }
        let called = sig.get(i + 1).is_some_and(|t| t.is_punct("("));
        let defined = i > 0 && sig[i - 1].is_word_ci("FUNCTION");
        if called || defined {
            found.insert(name);
        }
    }
    found
}

#[cfg(test)]
#[path = "udf_test.rs"]
mod tests;
