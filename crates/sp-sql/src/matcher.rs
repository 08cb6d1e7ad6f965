//! Token-stream matching primitives for rewrite rules.
//!
//! Matchers never look at raw text: they walk significant tokens with a
//! [`Cursor`], so a keyword inside a string literal or comment can never
//! match. Comments are not skipped by the cursor; a comment between two
//! pattern elements breaks the match.

use crate::token::{Token, TokenKind};

/// Replace tokens `start..end` with `replacement`.
///
/// `start == end` inserts before token `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl Edit {
    pub fn replace(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
        }
    }

    pub fn delete(start: usize, end: usize) -> Self {
        Self::replace(start, end, "")
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at, at, text)
    }
}

/// Edits produced by one rule match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub edits: Vec<Edit>,
}

impl RuleMatch {
    pub fn single(edit: Edit) -> Self {
        Self { edits: vec![edit] }
    }

    pub fn new(mut edits: Vec<Edit>) -> Self {
        edits.sort_by_key(|e| (e.start, e.end));
        Self { edits }
    }

    /// Token range covered by all edits
    pub fn extent(&self) -> (usize, usize) {
        let lo = self.edits.iter().map(|e| e.start).min().unwrap_or(0);
        let hi = self.edits.iter().map(|e| e.end).max().unwrap_or(lo);
        (lo, hi)
    }
}

/// A balanced bracket pair, as token indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group {
    pub open: usize,
    pub close: usize,
}

impl Group {
    /// Token range strictly inside the brackets
    pub fn inner(&self) -> (usize, usize) {
        (self.open + 1, self.close)
    }
}

/// Forward-only cursor over a token slice.
///
/// Every matching method skips whitespace first; on failure the cursor does
/// not move.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Token], pos: usize) -> Self {
        Self { tokens, pos }
    }

    /// Index of the next unconsumed token
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Index of the next non-whitespace token
    fn next_index(&self) -> Option<usize> {
        (self.pos..self.tokens.len()).find(|&i| self.tokens[i].kind != TokenKind::Whitespace)
    }

    /// Next non-whitespace token without consuming it
    pub fn peek(&self) -> Option<&'a Token> {
        self.next_index().map(|i| &self.tokens[i])
    }

    fn take_if(&mut self, pred: impl FnOnce(&Token) -> bool) -> Option<usize> {
        let i = self.next_index()?;
        if pred(&self.tokens[i]) {
            self.pos = i + 1;
            Some(i)
        } else {
            None
        }
    }

    /// Bare word, case-insensitive
    pub fn word(&mut self, word: &str) -> Option<usize> {
        self.take_if(|t| t.is_word_ci(word))
    }

    /// Sequence of bare words; returns the index of the last one
    pub fn words(&mut self, words: &[&str]) -> Option<usize> {
        let saved = self.pos;
        let mut last = None;
        for w in words {
            match self.word(w) {
                Some(i) => last = Some(i),
                None => {
                    self.pos = saved;
                    return None;
                }
            }
        }
        last
    }

    /// One of several bare words
    pub fn any_word(&mut self, words: &[&str]) -> Option<usize> {
        self.take_if(|t| words.iter().any(|w| t.is_word_ci(w)))
    }

    pub fn punct(&mut self, p: &str) -> Option<usize> {
        self.take_if(|t| t.is_punct(p))
    }

    pub fn operator(&mut self, op: &str) -> Option<usize> {
        self.take_if(|t| t.is_operator(op))
    }

    pub fn number(&mut self) -> Option<usize> {
        self.take_if(|t| t.kind == TokenKind::Number)
    }

    pub fn string(&mut self) -> Option<usize> {
        self.take_if(|t| t.kind == TokenKind::StringLiteral && t.closed)
    }

    /// Identifier (bare or quoted); keywords excluded
    pub fn ident(&mut self) -> Option<usize> {
        self.take_if(|t| t.kind == TokenKind::Identifier && t.closed)
    }

    /// Identifier or keyword used as a name
    pub fn name(&mut self) -> Option<usize> {
        self.take_if(|t| {
            (t.kind == TokenKind::Identifier && t.closed) || t.kind == TokenKind::Keyword
        })
    }

    /// Dotted name (`a.b.c`); returns the index range `first..=last`
    pub fn qualified_name(&mut self) -> Option<(usize, usize)> {
        let first = self.name()?;
        let mut last = first;
        loop {
            let saved = self.pos;
            if self.punct(".").is_some() {
                if let Some(i) = self.name() {
                    last = i;
                    continue;
                }
            }
            self.pos = saved;
            return Some((first, last));
        }
    }

    /// Balanced group opening with `open` (`(` or `[`)
    pub fn group_of(&mut self, open: &str) -> Option<Group> {
        let i = self.next_index()?;
        if !self.tokens[i].is_punct(open) {
            return None;
        }
        let close = matching_close(self.tokens, i)?;
        self.pos = close + 1;
        Some(Group { open: i, close })
    }

    /// Balanced parenthesised group
    pub fn group(&mut self) -> Option<Group> {
        self.group_of("(")
    }
}

fn closer(open: &str) -> Option<&'static str> {
    match open {
        "(" => Some(")"),
        "[" => Some("]"),
        "{" => Some("}"),
        _ => None,
    }
}

/// Index of the bracket closing the one at `open`
pub fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let open_text = tokens.get(open)?.text.as_str();
    let close_text = closer(open_text)?;
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if tok.kind != TokenKind::Punctuation {
            continue;
        }
        if tok.text == open_text {
            depth += 1;
        } else if tok.text == close_text {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Bracket nesting depth of every token (the depth *before* the token)
pub fn depths(tokens: &[Token]) -> Vec<usize> {
    let mut depth = 0usize;
    tokens
        .iter()
        .map(|t| {
            let here = depth;
            if t.kind == TokenKind::Punctuation {
                match t.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            here
        })
        .collect()
}

/// Split the inside of a group at top-level commas into trimmed token ranges
pub fn split_args(tokens: &[Token], group: Group) -> Vec<(usize, usize)> {
    let (lo, hi) = group.inner();
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = lo;
    for i in lo..hi {
        let t = &tokens[i];
        if t.kind != TokenKind::Punctuation {
            continue;
        }
        match t.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            "," if depth == 0 => {
                args.push(trim(tokens, start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = trim(tokens, start, hi);
    if last.0 < last.1 || !args.is_empty() {
        args.push(last);
    }
    args
}

/// Narrow a range to exclude leading and trailing whitespace
pub fn trim(tokens: &[Token], mut lo: usize, mut hi: usize) -> (usize, usize) {
    while lo < hi && tokens[lo].kind == TokenKind::Whitespace {
        lo += 1;
    }
    while hi > lo && tokens[hi - 1].kind == TokenKind::Whitespace {
        hi -= 1;
    }
    (lo, hi)
}

/// Concatenated text of `tokens[lo..hi]`
pub fn text_of(tokens: &[Token], lo: usize, hi: usize) -> String {
    tokens[lo..hi].iter().map(|t| t.text.as_str()).collect()
}

/// Index of the first significant token
pub fn first_significant(tokens: &[Token]) -> Option<usize> {
    tokens.iter().position(Token::is_significant)
}

/// Whether `pos` is the first significant token of the statement
pub fn is_statement_start(tokens: &[Token], pos: usize) -> bool {
    first_significant(tokens) == Some(pos)
}

/// Index of the previous non-whitespace token before `pos`
pub fn prev_non_ws(tokens: &[Token], pos: usize) -> Option<usize> {
    (0..pos).rev().find(|&i| tokens[i].kind != TokenKind::Whitespace)
}

/// `CREATE ... TABLE` statement
pub fn is_create_table(tokens: &[Token]) -> bool {
    let mut sig = tokens.iter().filter(|t| t.is_significant());
    if !sig.next().is_some_and(|t| t.is_word_ci("CREATE")) {
        return false;
    }
    sig.take(4).any(|t| t.is_word_ci("TABLE"))
}

/// For a CTAS, the index of the top-level `AS` that introduces the query
pub fn ctas_as(tokens: &[Token]) -> Option<usize> {
    if !is_create_table(tokens) {
        return None;
    }
    let depth = depths(tokens);
    for (i, tok) in tokens.iter().enumerate() {
        if depth[i] != 0 || !tok.is_word_ci("AS") {
            continue;
        }
        let next = Cursor::new(tokens, i + 1).peek()?;
        if next.is_word_ci("SELECT") || next.is_word_ci("WITH") || next.is_punct("(") {
            return Some(i);
        }
    }
    None
}

/// Whitespace to delete along with a removed clause: the run right after `end`,
/// or if there is none, the run right before `start`
pub fn absorb_whitespace(tokens: &[Token], start: usize, end: usize) -> (usize, usize) {
    if tokens.get(end).is_some_and(|t| t.kind == TokenKind::Whitespace) {
        (start, end + 1)
    } else if start > 0 && tokens[start - 1].kind == TokenKind::Whitespace {
        (start - 1, end)
    } else {
        (start, end)
    }
}

#[cfg(test)]
#[path = "matcher_test.rs"]
mod tests;
