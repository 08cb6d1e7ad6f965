//! Structure-preserving SQL lexer.
//!
//! The lexer never fails: every byte of the input lands in exactly one token,
//! so concatenating token text reconstructs the input. Strings, quoted
//! identifiers and comments are consumed greedily to their closing delimiter;
//! one that runs off the end of the input is emitted with `closed == false`.

use crate::token::{is_keyword, Token, TokenKind};
use sp_core::{SourceDialect, Span};

/// Operators longer than one character, longest first
const MULTI_CHAR_OPERATORS: &[&str] = &["<=>", "<=", ">=", "<>", "!=", "||", "::", "->", "=>", "=="];

/// Tokenize `sql` using the literal conventions of `dialect`
pub fn tokenize(sql: &str, dialect: SourceDialect) -> Vec<Token> {
    Lexer {
        src: sql,
        pos: 0,
        dialect,
    }
    .run()
}

/// Tokenize Databricks SQL (rewrite output, AI candidates).
///
/// Spark SQL shares Hive's literal conventions: double quotes delimit strings
/// and backslash escapes apply.
pub fn tokenize_target(sql: &str) -> Vec<Token> {
    tokenize(sql, SourceDialect::Hive)
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    dialect: SourceDialect,
}

impl Lexer<'_> {
    fn run(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let start = self.pos;
            let (kind, closed) = self.lex_one(c, start);
            tokens.push(Token {
                kind,
                text: self.src[start..self.pos].to_string(),
                span: Span::new(start, self.pos),
                closed,
            });
        }
        tokens
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn lex_one(&mut self, c: char, start: usize) -> (TokenKind, bool) {
        match c {
            c if c.is_whitespace() => {
                self.eat_while(char::is_whitespace);
                (TokenKind::Whitespace, true)
            }
            '-' if self.byte_at(1) == Some(b'-') => {
                self.eat_while(|c| c != '\n');
                (TokenKind::Comment, true)
            }
            '/' if self.byte_at(1) == Some(b'*') => (TokenKind::Comment, self.eat_block_comment()),
            '\'' => {
                let escapes = self.dialect.backslash_escapes();
                (TokenKind::StringLiteral, self.eat_quoted('\'', escapes))
            }
            '"' if self.dialect.double_quote_is_string() => {
                let escapes = self.dialect.backslash_escapes();
                (TokenKind::StringLiteral, self.eat_quoted('"', escapes))
            }
            '"' => (TokenKind::Identifier, self.eat_quoted('"', false)),
            '`' => (TokenKind::Identifier, self.eat_quoted('`', false)),
            c if c.is_ascii_digit() => {
                self.eat_number();
                (TokenKind::Number, true)
            }
            '.' if self.byte_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                self.eat_number();
                (TokenKind::Number, true)
            }
            c if c.is_alphabetic() || c == '_' => {
                self.eat_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                if is_keyword(&self.src[start..self.pos]) {
                    (TokenKind::Keyword, true)
                } else {
                    (TokenKind::Identifier, true)
                }
            }
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | ';' | '.' => {
                self.bump();
                (TokenKind::Punctuation, true)
            }
            _ => {
                let rest = &self.src[self.pos..];
                match MULTI_CHAR_OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                    Some(op) => self.pos += op.len(),
                    None => {
                        self.bump();
                    }
                }
                (TokenKind::Operator, true)
            }
        }
    }

    /// Consume a block comment starting at `/*`; returns whether `*/` was found
    fn eat_block_comment(&mut self) -> bool {
        self.pos += 2;
        match self.src[self.pos..].find("*/") {
            Some(i) => {
                self.pos += i + 2;
                true
            }
            None => {
                self.pos = self.src.len();
                false
            }
        }
    }

    /// Consume a quoted literal; a doubled quote is an escaped quote
    fn eat_quoted(&mut self, quote: char, backslash_escapes: bool) -> bool {
        self.bump();
        loop {
            match self.bump() {
                None => return false,
                Some('\\') if backslash_escapes => {
                    if self.bump().is_none() {
                        return false;
                    }
                }
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        self.bump();
                    } else {
                        return true;
                    }
                }
                Some(_) => {}
            }
        }
    }

    fn eat_number(&mut self) {
        self.eat_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.byte_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exp_digit = match self.byte_at(1) {
                Some(b'+' | b'-') => self.byte_at(2).is_some_and(|b| b.is_ascii_digit()),
                Some(b) => b.is_ascii_digit(),
                None => false,
            };
            if exp_digit {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.eat_while(|c| c.is_ascii_digit());
            }
        }
        // Type suffixes such as 10L, 1.5BD, 2Y
        self.eat_while(|c| c.is_ascii_alphabetic());
    }
}

/// Reassemble token text; inverse of [`tokenize`]
pub fn render(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

/// First token left open at end of input, if any
pub fn first_unclosed(tokens: &[Token]) -> Option<&Token> {
    tokens.iter().find(|t| !t.closed)
}

#[cfg(test)]
#[path = "lexer_test.rs"]
mod tests;
