//! Token types produced by the lexer

use serde::{Deserialize, Serialize};
use sp_core::Span;

/// Lexical category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Bare or quoted identifier
    Identifier,
    /// Reserved or clause word (see [`KEYWORDS`])
    Keyword,
    /// Quoted string literal, including its delimiters
    StringLiteral,
    /// Numeric literal, including any type suffix
    Number,
    /// Line or block comment, including optimizer hints
    Comment,
    Operator,
    Whitespace,
    /// One of `( ) [ ] { } , ; .`
    Punctuation,
}

/// Clause and reserved words recognised as [`TokenKind::Keyword`].
///
/// Sorted so lookups can binary search. Function and type names are
/// deliberately absent; they lex as identifiers.
pub const KEYWORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "ANTI", "ANY", "ARRAY", "AS", "ASC", "BETWEEN", "BUCKETS",
    "BY", "CASE", "CAST", "CLUSTER", "CLUSTERED", "CREATE", "CROSS", "CURRENT", "DELETE", "DESC",
    "DISTINCT", "DISTRIBUTE", "DROP", "ELSE", "END", "EXCEPT", "EXISTS", "EXPLAIN", "EXTERNAL",
    "FALSE", "FETCH", "FOLLOWING", "FOR", "FROM", "FULL", "FUNCTION", "GROUP", "HAVING", "IF",
    "IN", "INNER", "INSERT", "INTERSECT", "INTERVAL", "INTO", "IS", "JAR", "JOIN", "LATERAL",
    "LEFT", "LIKE", "LIMIT", "LOCATION", "MERGE", "NATURAL", "NOT", "NULL", "OF", "OFFSET", "ON",
    "OR", "ORDER", "ORDINALITY", "OUTER", "OVER", "OVERWRITE", "PARTITION", "PARTITIONED",
    "PRECEDING", "QUALIFY", "RANGE", "REPLACE", "RIGHT", "ROW", "ROWS", "SELECT", "SEMI", "SET",
    "SORT", "SORTED", "STORED", "TABLE", "TABLESAMPLE", "TBLPROPERTIES", "TEMPORARY", "THEN",
    "TRUE", "UNBOUNDED", "UNION", "UNNEST", "UPDATE", "USING", "VALUES", "VIEW", "WHEN", "WHERE",
    "WINDOW", "WITH",
];

/// Whether a bare word is a keyword (case-insensitive)
pub fn is_keyword(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    KEYWORDS.binary_search(&upper.as_str()).is_ok()
}

/// A lexical token with its position in the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source text, delimiters included
    pub text: String,
    /// Byte range in the text that was lexed
    pub span: Span,
    /// False for a string, quoted identifier or block comment that hit end of input
    pub closed: bool,
}

impl Token {
    /// Neither whitespace nor a comment
    pub fn is_significant(&self) -> bool {
        !matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Unquoted identifier or keyword
    pub fn is_word(&self) -> bool {
        match self.kind {
            TokenKind::Keyword => true,
            TokenKind::Identifier => !self.is_quoted(),
            _ => false,
        }
    }

    /// Case-insensitive comparison against a bare word
    pub fn is_word_ci(&self, word: &str) -> bool {
        self.is_word() && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == p
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    /// Identifier wrapped in backticks or double quotes
    pub fn is_quoted(&self) -> bool {
        self.kind == TokenKind::Identifier
            && (self.text.starts_with('`') || self.text.starts_with('"'))
    }

    /// Optimizer hint comment (`/*+ ... */`)
    pub fn is_hint(&self) -> bool {
        self.kind == TokenKind::Comment && self.text.starts_with("/*+")
    }

    /// Lowercase identifier name without quotes, for name comparisons
    pub fn ident_name(&self) -> String {
        let text = self.text.as_str();
        if self.is_quoted() && text.len() >= 2 && self.closed {
            let quote = &text[..1];
            let inner = &text[1..text.len() - 1];
            inner.replace(&quote.repeat(2), quote).to_lowercase()
        } else {
            text.to_lowercase()
        }
    }

    /// Content of a closed string literal without its delimiters
    pub fn string_value(&self) -> Option<String> {
        if self.kind != TokenKind::StringLiteral || !self.closed || self.text.len() < 2 {
            return None;
        }
        let quote = &self.text[..1];
        let inner = &self.text[1..self.text.len() - 1];
        Some(inner.replace(&quote.repeat(2), quote))
    }
}
