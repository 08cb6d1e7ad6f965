//! Rewrite engine: bounded fixed-point application of the rule catalog

use crate::catalog::{RewriteRule, RuleCatalog};
use crate::error::{SqlError, SqlResult};
use crate::lexer::tokenize;
use crate::matcher::{text_of, Edit};
use crate::splitter::Statement;
use crate::token::{Token, TokenKind};
use log::debug;
use sp_core::{SourceDialect, Span, Transformation};
use std::sync::Arc;

/// Default pass ceiling
pub const DEFAULT_MAX_PASSES: usize = 8;

/// Rewritten statement text plus its audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    pub sql: String,
    /// Every applied edit, in application order
    pub transformations: Vec<Transformation>,
    /// Passes executed, including the final pass that changed nothing
    pub passes: usize,
}

impl RewriteOutput {
    pub fn changed(&self) -> bool {
        !self.transformations.is_empty()
    }

    /// Names of the rules that fired, deduplicated, in first-use order
    pub fn rules_applied(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for t in &self.transformations {
            if !names.contains(&t.rule.as_str()) {
                names.push(&t.rule);
            }
        }
        names
    }
}

/// Applies a frozen [`RuleCatalog`] to statements.
///
/// Each pass runs every rule for the statement's dialect in catalog order;
/// a rule rewrites all of its non-overlapping matches left to right, and the
/// text is re-lexed before the next rule. Passes repeat until one produces no
/// transformation. A statement still changing after `max_passes` passes is
/// reported as [`SqlError::DidNotConverge`].
#[derive(Debug, Clone)]
pub struct RewriteEngine {
    catalog: Arc<RuleCatalog>,
    max_passes: usize,
}

impl RewriteEngine {
    pub fn new(catalog: Arc<RuleCatalog>, max_passes: usize) -> SqlResult<Self> {
        if max_passes == 0 {
            return Err(SqlError::InvalidPassCeiling);
        }
        Ok(Self {
            catalog,
            max_passes,
        })
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Rewrite one statement
    pub fn rewrite_statement(&self, statement: &Statement) -> SqlResult<RewriteOutput> {
        self.rewrite(&statement.text(), statement.dialect)
    }

    /// Rewrite raw statement text written in `dialect`
    pub fn rewrite(&self, sql: &str, dialect: SourceDialect) -> SqlResult<RewriteOutput> {
        let rules: Vec<&RewriteRule> = self.catalog.for_dialect(dialect).collect();
        let mut text = sql.to_string();
        let mut log: Vec<Transformation> = Vec::new();

        for pass in 1..=self.max_passes {
            let mut changed = false;
            for rule in &rules {
                if let Some((next, mut applied)) = apply_rule(rule, &text, dialect, pass) {
                    text = next;
                    log.append(&mut applied);
                    changed = true;
                }
            }
            if !changed {
                debug!(
                    "rewrite converged after {} pass(es), {} transformation(s)",
                    pass,
                    log.len()
                );
                return Ok(RewriteOutput {
                    sql: text,
                    transformations: log,
                    passes: pass,
                });
            }
        }

        Err(SqlError::DidNotConverge {
            passes: self.max_passes,
        })
    }
}

/// Run one rule over the text; `None` when it matched nothing
fn apply_rule(
    rule: &RewriteRule,
    text: &str,
    dialect: SourceDialect,
    pass: usize,
) -> Option<(String, Vec<Transformation>)> {
    let tokens = tokenize(text, dialect);
    let edits = collect_edits(rule, &tokens);
    if edits.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(text.len());
    let mut applied = Vec::with_capacity(edits.len());
    let mut consumed = 0;
    for edit in edits {
        let start = byte_start(&tokens, edit.start, text.len());
        let end = if edit.end > edit.start {
            tokens[edit.end - 1].span.end
        } else {
            start
        };
        out.push_str(&text[consumed..start]);
        let original = &text[start..end];
        debug!(
            "{} (pass {}): {:?} -> {:?}",
            rule.name, pass, original, edit.replacement
        );
        // `out` holds everything before this edit, so its length is the
        // edit's offset in the text as it evolves
        applied.push(Transformation {
            rule: rule.name.to_string(),
            pass,
            span: Span::new(out.len(), out.len() + original.len()),
            original: original.to_string(),
            replacement: edit.replacement.clone(),
        });
        out.push_str(&edit.replacement);
        consumed = end;
    }
    out.push_str(&text[consumed..]);
    Some((out, applied))
}

/// Non-overlapping, effective edits of every match, left to right
fn collect_edits(rule: &RewriteRule, tokens: &[Token]) -> Vec<Edit> {
    let mut edits: Vec<Edit> = Vec::new();
    let mut next_free = 0;
    let mut pos = 0;

    while pos < tokens.len() {
        if pos < next_free || tokens[pos].kind == TokenKind::Whitespace {
            pos += 1;
            continue;
        }
        if let Some(found) = rule.find(tokens, pos) {
            let mut effective: Vec<Edit> = found
                .edits
                .into_iter()
                .filter(|e| e.start <= e.end && e.end <= tokens.len())
                .filter(|e| text_of(tokens, e.start, e.end) != e.replacement)
                .collect();
            effective.sort_by_key(|e| (e.start, e.end));
            let disjoint = effective.windows(2).all(|w| w[0].end <= w[1].start);
            if let (Some(first), Some(last)) = (effective.first(), effective.last()) {
                let lo = first.start;
                let hi = effective.iter().map(|e| e.end).max().unwrap_or(last.end);
                if disjoint && lo >= next_free {
                    next_free = hi.max(pos + 1);
                    edits.extend(effective);
                    pos = next_free;
                    continue;
                }
            }
        }
        pos += 1;
    }
    edits
}

fn byte_start(tokens: &[Token], index: usize, text_len: usize) -> usize {
    tokens.get(index).map_or(text_len, |t| t.span.start)
}

/// Apply a transformation log to the text it was recorded against
pub fn replay(original: &str, transformations: &[Transformation]) -> Option<String> {
    let mut text = original.to_string();
    for t in transformations {
        let end = t.span.start + t.original.len();
        if text.get(t.span.start..end)? != t.original {
            return None;
        }
        text.replace_range(t.span.start..end, &t.replacement);
    }
    Some(text)
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
