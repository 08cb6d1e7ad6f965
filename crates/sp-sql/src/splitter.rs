//! Statement splitter
//!
//! Splits a source unit at top-level `;` terminators. The unit is kept as an
//! alternating sequence of statements and trivia (whitespace, comment-only
//! pieces, terminators) so it can be reassembled byte for byte.

use crate::lexer::{first_unclosed, render, tokenize};
use crate::token::{Token, TokenKind};
use sp_core::{SourceDialect, Span};

/// One top-level statement of a source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Source unit identifier
    pub unit: String,
    /// 0-based position among the unit's statements
    pub index: usize,
    pub dialect: SourceDialect,
    /// Byte range of the statement within the unit text
    pub span: Span,
    /// Tokens with spans relative to the start of the statement
    pub tokens: Vec<Token>,
}

impl Statement {
    pub fn text(&self) -> String {
        render(&self.tokens)
    }

    /// Message describing why the statement cannot be processed, if it cannot
    pub fn unparseable_reason(&self) -> Option<String> {
        first_unclosed(&self.tokens).map(|t| {
            let what = match t.kind {
                TokenKind::StringLiteral => "string literal",
                TokenKind::Comment => "block comment",
                _ => "quoted identifier",
            };
            format!(
                "unterminated {} starting at byte {}",
                what,
                self.span.start + t.span.start
            )
        })
    }

    /// Display name: the created object, or `query_<n>` (1-based)
    pub fn display_name(&self) -> String {
        statement_name(&self.tokens).unwrap_or_else(|| format!("query_{}", self.index + 1))
    }
}

/// A piece of a source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Statement(Statement),
    /// Text between statements
    Trivia(String),
}

/// A dialect-tagged file split into statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub name: String,
    pub dialect: SourceDialect,
    pub segments: Vec<Segment>,
}

impl SourceUnit {
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Statement(stmt) => Some(stmt),
            Segment::Trivia(_) => None,
        })
    }

    pub fn statement_count(&self) -> usize {
        self.statements().count()
    }

    /// Reassemble the original text
    pub fn reconstruct(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Statement(stmt) => out.push_str(&stmt.text()),
                Segment::Trivia(text) => out.push_str(text),
            }
        }
        out
    }
}

/// Split `sql` into statements at top-level semicolons.
///
/// A `;` inside a string, comment, or any bracket pair does not split.
/// Leading and trailing whitespace of each piece is trivia; a piece with no
/// significant tokens is trivia entirely.
pub fn split(unit: &str, sql: &str, dialect: SourceDialect) -> SourceUnit {
    let tokens = tokenize(sql, dialect);
    let mut segments = Vec::new();
    let mut index = 0;
    let mut depth: usize = 0;
    let mut piece_start = 0;

    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind != TokenKind::Punctuation {
            continue;
        }
        match tok.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            ";" if depth == 0 => {
                push_piece(unit, dialect, &tokens[piece_start..i], &mut index, &mut segments);
                push_trivia(&mut segments, &tok.text);
                piece_start = i + 1;
            }
            _ => {}
        }
    }
    push_piece(unit, dialect, &tokens[piece_start..], &mut index, &mut segments);

    SourceUnit {
        name: unit.to_string(),
        dialect,
        segments,
    }
}

fn push_trivia(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Trivia(prev)) = segments.last_mut() {
        prev.push_str(text);
    } else {
        segments.push(Segment::Trivia(text.to_string()));
    }
}

fn push_piece(
    unit: &str,
    dialect: SourceDialect,
    piece: &[Token],
    index: &mut usize,
    segments: &mut Vec<Segment>,
) {
    if !piece.iter().any(Token::is_significant) {
        push_trivia(segments, &render(piece));
        return;
    }

    let first = piece
        .iter()
        .position(|t| t.kind != TokenKind::Whitespace)
        .unwrap_or(0);
    let last = piece
        .iter()
        .rposition(|t| t.kind != TokenKind::Whitespace)
        .map_or(piece.len(), |p| p + 1);

    push_trivia(segments, &render(&piece[..first]));

    let body = &piece[first..last];
    let base = body.first().map_or(0, |t| t.span.start);
    let end = body.last().map_or(base, |t| t.span.end);
    let tokens = body
        .iter()
        .map(|t| Token {
            span: Span::new(t.span.start - base, t.span.end - base),
            ..t.clone()
        })
        .collect();
    segments.push(Segment::Statement(Statement {
        unit: unit.to_string(),
        index: *index,
        dialect,
        span: Span::new(base, end),
        tokens,
    }));
    *index += 1;

    push_trivia(segments, &render(&piece[last..]));
}

/// Name of the object a `CREATE` statement defines
pub fn statement_name(tokens: &[Token]) -> Option<String> {
    let mut sig = tokens.iter().filter(|t| t.is_significant()).peekable();
    if !sig.next()?.is_word_ci("CREATE") {
        return None;
    }
    const MODIFIERS: &[&str] = &[
        "OR", "REPLACE", "TEMPORARY", "TEMP", "EXTERNAL", "GLOBAL", "MATERIALIZED", "TRANSIENT",
    ];
    let mut kind_found = false;
    for tok in sig.by_ref() {
        if MODIFIERS.iter().any(|m| tok.is_word_ci(m)) {
            continue;
        }
        if ["TABLE", "VIEW", "FUNCTION"].iter().any(|k| tok.is_word_ci(k)) {
            kind_found = true;
            break;
        }
        return None;
    }
    if !kind_found {
        return None;
    }

    // IF NOT EXISTS
    if sig.peek().is_some_and(|t| t.is_word_ci("IF")) {
        sig.next();
        sig.next();
        sig.next();
    }

    let mut name = String::new();
    loop {
        let part = sig.next()?;
        if !(part.kind == TokenKind::Identifier || part.kind == TokenKind::Keyword) {
            return if name.is_empty() { None } else { Some(name) };
        }
        name.push_str(&part.text);
        if sig.peek().is_some_and(|t| t.is_punct(".")) {
            sig.next();
            name.push('.');
        } else {
            return Some(name);
        }
    }
}

#[cfg(test)]
#[path = "splitter_test.rs"]
mod tests;
