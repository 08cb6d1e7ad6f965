//! Semantic issue detection over rewritten Databricks SQL.
//!
//! The detector looks for shapes that pass a syntax check but are known to
//! fail (or silently change meaning) at execution. It never edits the
//! statement; every finding becomes an advisory [`SemanticFlag`].
//!
//! Detection works on significant tokens only. A light structural pass
//! locates each `SELECT` block, its clauses at the block's own bracket depth,
//! and the parenthesised subqueries nested inside it. Patterns are plain
//! functions over that [`StatementShape`], so the catalog can be extended
//! without touching the detector.

use crate::lexer::tokenize_target;
use crate::token::{Token, TokenKind};
use sp_core::{SemanticFlag, Severity, Span};
use std::collections::BTreeSet;

/// Aggregate functions recognised when not followed by `OVER`
pub const AGGREGATE_FUNCTIONS: &[&str] = &[
    "any_value",
    "approx_count_distinct",
    "array_agg",
    "avg",
    "bool_and",
    "bool_or",
    "collect_list",
    "collect_set",
    "count",
    "count_if",
    "first",
    "last",
    "max",
    "max_by",
    "min",
    "min_by",
    "percentile_approx",
    "stddev",
    "sum",
    "variance",
];

/// Words that end the clause before them at the same depth
const CLAUSE_WORDS: &[&str] = &[
    "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "WINDOW", "QUALIFY", "CLUSTER",
    "DISTRIBUTE", "SORT",
];

/// Set operators that end a `SELECT` block
const SET_OPERATORS: &[&str] = &["UNION", "INTERSECT", "EXCEPT"];

/// Signature of a pattern check
pub type PatternCheck = fn(&StatementShape<'_>) -> Vec<SemanticFlag>;

/// One entry of the semantic pattern catalog
#[derive(Clone, Copy)]
pub struct SemanticPattern {
    pub name: &'static str,
    pub description: &'static str,
    pub check: PatternCheck,
}

impl std::fmt::Debug for SemanticPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticPattern")
            .field("name", &self.name)
            .finish()
    }
}

/// The built-in pattern catalog
pub fn builtin_patterns() -> Vec<SemanticPattern> {
    vec![
        SemanticPattern {
            name: "distinct-with-window",
            description: "SELECT DISTINCT combined with a window function in the same SELECT list",
            check: distinct_with_window,
        },
        SemanticPattern {
            name: "aggregate-in-window-order-by",
            description: "aggregate function inside a window ORDER BY",
            check: aggregate_in_window_order_by,
        },
        SemanticPattern {
            name: "mixed-aggregate-window",
            description: "bare aggregates and window functions at the same SELECT level",
            check: mixed_aggregate_window,
        },
        SemanticPattern {
            name: "correlated-subquery",
            description: "correlated subquery that cannot be proven join-rewritable",
            check: correlated_subquery,
        },
    ]
}

/// Runs a pattern catalog against statements
#[derive(Debug, Clone)]
pub struct SemanticDetector {
    patterns: Vec<SemanticPattern>,
}

impl Default for SemanticDetector {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SemanticDetector {
    pub fn new(patterns: Vec<SemanticPattern>) -> Self {
        Self { patterns }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_patterns())
    }

    pub fn patterns(&self) -> &[SemanticPattern] {
        &self.patterns
    }

    /// Detect issues in Databricks SQL text
    pub fn detect(&self, sql: &str) -> Vec<SemanticFlag> {
        self.detect_tokens(&tokenize_target(sql))
    }

    /// Detect issues in an already lexed statement.
    ///
    /// Flags are ordered by position, then pattern name.
    pub fn detect_tokens(&self, tokens: &[Token]) -> Vec<SemanticFlag> {
        let shape = StatementShape::new(tokens);
        let mut flags: Vec<SemanticFlag> = self
            .patterns
            .iter()
            .flat_map(|pattern| (pattern.check)(&shape))
            .collect();
        flags.sort_by(|a, b| {
            (a.span.start, &a.pattern, a.span.end).cmp(&(b.span.start, &b.pattern, b.span.end))
        });
        flags.dedup();
        if !flags.is_empty() {
            log::debug!("semantic detector raised {} flag(s)", flags.len());
        }
        flags
    }
}

/// Clause boundaries of one `SELECT` block, as significant-token indices.
///
/// Ranges are half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectBlock {
    pub select: usize,
    pub depth: usize,
    pub distinct: bool,
    pub list: (usize, usize),
    pub from: Option<(usize, usize)>,
    pub where_clause: Option<(usize, usize)>,
    pub having: Option<(usize, usize)>,
    pub end: usize,
}

/// A function call followed by `OVER`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCall {
    pub name: usize,
    pub over: usize,
    /// `(` and `)` of an inline window specification
    pub spec: Option<(usize, usize)>,
}

impl WindowCall {
    /// Last significant index of the call
    pub fn last(&self) -> usize {
        self.spec.map(|(_, close)| close).unwrap_or(self.over + 1)
    }
}

/// Structural view of one statement's significant tokens
pub struct StatementShape<'a> {
    sig: Vec<&'a Token>,
    depth: Vec<usize>,
    close: Vec<Option<usize>>,
    blocks: Vec<SelectBlock>,
}

impl<'a> StatementShape<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        let sig: Vec<&Token> = tokens.iter().filter(|t| t.is_significant()).collect();

        let mut depth = Vec::with_capacity(sig.len());
        let mut close = vec![None; sig.len()];
        let mut stack: Vec<usize> = Vec::new();
        let mut level = 0usize;
        for (i, tok) in sig.iter().enumerate() {
            if tok.kind == TokenKind::Punctuation && matches!(tok.text.as_str(), ")" | "]" | "}")
            {
                level = level.saturating_sub(1);
                if tok.text == ")" {
                    if let Some(open) = stack.pop() {
                        close[open] = Some(i);
                    }
                }
            }
            depth.push(level);
            if tok.kind == TokenKind::Punctuation && matches!(tok.text.as_str(), "(" | "[" | "{")
            {
                level += 1;
                if tok.text == "(" {
                    stack.push(i);
                }
            }
        }

        let mut shape = Self {
            sig,
            depth,
            close,
            blocks: Vec::new(),
        };
        shape.blocks = shape.find_blocks();
        shape
    }

    pub fn len(&self) -> usize {
        self.sig.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sig.is_empty()
    }

    pub fn token(&self, i: usize) -> Option<&'a Token> {
        self.sig.get(i).copied()
    }

    pub fn blocks(&self) -> &[SelectBlock] {
        &self.blocks
    }

    /// Byte span covering significant tokens `first..=last`
    pub fn span(&self, first: usize, last: usize) -> Span {
        let last = last.min(self.sig.len().saturating_sub(1));
        Span::new(self.sig[first].span.start, self.sig[last].span.end)
    }

    fn word_at(&self, i: usize, word: &str) -> bool {
        self.sig.get(i).is_some_and(|t| t.is_word_ci(word))
    }

    fn punct_at(&self, i: usize, p: &str) -> bool {
        self.sig.get(i).is_some_and(|t| t.is_punct(p))
    }

    /// `(` that opens a nested query
    pub fn is_subquery_open(&self, i: usize) -> bool {
        self.punct_at(i, "(")
            && self.close[i].is_some()
            && (self.word_at(i + 1, "SELECT") || self.word_at(i + 1, "WITH"))
    }

    /// Indices in `lo..hi`, skipping the contents of nested queries
    pub fn walk(&self, lo: usize, hi: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut i = lo;
        while i < hi.min(self.sig.len()) {
            if self.is_subquery_open(i) {
                if let Some(c) = self.close[i] {
                    i = c + 1;
                    continue;
                }
            }
            out.push(i);
            i += 1;
        }
        out
    }

    fn find_blocks(&self) -> Vec<SelectBlock> {
        let mut blocks = Vec::new();
        for select in 0..self.sig.len() {
            if !self.word_at(select, "SELECT") {
                continue;
            }
            let d = self.depth[select];

            let mut end = self.sig.len();
            let mut clauses: Vec<(usize, String)> = Vec::new();
            for j in select + 1..self.sig.len() {
                if self.depth[j] < d || self.punct_at(j, ";") {
                    end = j;
                    break;
                }
                if self.depth[j] != d {
                    continue;
                }
                let tok = self.sig[j];
                if SET_OPERATORS.iter().any(|w| tok.is_word_ci(w)) {
                    end = j;
                    break;
                }
                if let Some(word) = CLAUSE_WORDS.iter().find(|w| tok.is_word_ci(w)) {
                    clauses.push((j, word.to_string()));
                }
            }

            let region = |name: &str| -> Option<(usize, usize)> {
                let pos = clauses.iter().position(|(_, w)| w == name)?;
                let start = clauses[pos].0 + 1;
                let stop = clauses.get(pos + 1).map(|(j, _)| *j).unwrap_or(end);
                Some((start, stop))
            };

            let mut list_start = select + 1;
            let distinct = self.word_at(list_start, "DISTINCT");
            if distinct || self.word_at(list_start, "ALL") {
                list_start += 1;
            }
            let list_end = clauses.first().map(|(j, _)| *j).unwrap_or(end);

            blocks.push(SelectBlock {
                select,
                depth: d,
                distinct,
                list: (list_start, list_end),
                from: region("FROM"),
                where_clause: region("WHERE"),
                having: region("HAVING"),
                end,
            });
        }
        blocks
    }

    /// Index of the matching `)` for a `(` at `i`
    pub fn close_of(&self, i: usize) -> Option<usize> {
        self.close.get(i).copied().flatten()
    }

    /// `name(` not preceded by `.`
    fn call_at(&self, i: usize) -> Option<usize> {
        let tok = self.sig.get(i)?;
        if !(tok.kind == TokenKind::Identifier && !tok.is_quoted()) {
            return None;
        }
        if i > 0 && self.punct_at(i - 1, ".") {
            return None;
        }
        if !self.punct_at(i + 1, "(") {
            return None;
        }
        self.close_of(i + 1)
    }

    /// Window function calls among the given indices
    pub fn window_calls(&self, indices: &[usize]) -> Vec<WindowCall> {
        indices
            .iter()
            .filter_map(|&i| {
                let close = self.call_at(i)?;
                let over = close + 1;
                if !self.word_at(over, "OVER") {
                    return None;
                }
                let spec = if self.punct_at(over + 1, "(") {
                    self.close_of(over + 1).map(|c| (over + 1, c))
                } else {
                    None
                };
                Some(WindowCall {
                    name: i,
                    over,
                    spec,
                })
            })
            .collect()
    }

    /// Aggregate calls among the given indices that are not windowed.
    ///
    /// Returns `(name, close)` index pairs.
    pub fn aggregate_calls(&self, indices: &[usize]) -> Vec<(usize, usize)> {
        indices
            .iter()
            .filter_map(|&i| {
                let close = self.call_at(i)?;
                let name = self.sig[i].text.to_ascii_lowercase();
                if AGGREGATE_FUNCTIONS.binary_search(&name.as_str()).is_err() {
                    return None;
                }
                if self.word_at(close + 1, "OVER") {
                    return None;
                }
                Some((i, close))
            })
            .collect()
    }

    /// Innermost block that encloses index `i` at a shallower depth
    fn enclosing_block(&self, i: usize) -> Option<&SelectBlock> {
        self.blocks
            .iter()
            .filter(|b| b.select < i && i < b.end && b.depth <= self.depth[i])
            .max_by_key(|b| (b.depth, b.select))
    }

    /// Table names and aliases introduced by a block's FROM clause
    fn from_names(&self, block: &SelectBlock) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let Some((lo, hi)) = block.from else {
            return names;
        };
        let mut expect_table = true;
        let mut j = lo;
        while j < hi {
            if self.depth[j] != block.depth {
                j += 1;
                continue;
            }
            let tok = self.sig[j];
            if expect_table {
                if tok.is_punct("(") {
                    j = self.close_of(j).map(|c| c + 1).unwrap_or(hi);
                    j = self.take_alias(j, hi, &mut names);
                    expect_table = false;
                    continue;
                }
                if tok.kind == TokenKind::Identifier {
                    while self.punct_at(j + 1, ".")
                        && self
                            .sig
                            .get(j + 2)
                            .is_some_and(|t| t.kind == TokenKind::Identifier)
                    {
                        j += 2;
                    }
                    names.insert(self.sig[j].ident_name());
                    j = self.take_alias(j + 1, hi, &mut names);
                    expect_table = false;
                    continue;
                }
            }
            if tok.is_punct(",") || tok.is_word_ci("JOIN") {
                expect_table = true;
            } else if tok.is_word_ci("VIEW") {
                // LATERAL VIEW [OUTER] fn(...) alias
                let mut k = j + 1;
                if self.word_at(k, "OUTER") {
                    k += 1;
                }
                if let Some(c) = self.call_at(k) {
                    j = self.take_alias(c + 1, hi, &mut names);
                    continue;
                }
            }
            j += 1;
        }
        names
    }

    fn take_alias(&self, mut j: usize, hi: usize, names: &mut BTreeSet<String>) -> usize {
        if j < hi && self.word_at(j, "AS") {
            j += 1;
        }
        if j < hi && self.sig[j].kind == TokenKind::Identifier {
            names.insert(self.sig[j].ident_name());
            j += 1;
        }
        j
    }
}

fn distinct_with_window(shape: &StatementShape<'_>) -> Vec<SemanticFlag> {
    let mut flags = Vec::new();
    for block in shape.blocks().iter().filter(|b| b.distinct) {
        let list = shape.walk(block.list.0, block.list.1);
        let Some(window) = shape.window_calls(&list).into_iter().next() else {
            continue;
        };
        let name = &shape.sig[window.name].text;
        flags.push(SemanticFlag {
            pattern: "distinct-with-window".to_string(),
            severity: Severity::ManualReviewRequired,
            span: shape.span(block.select, window.last()),
            explanation: format!(
                "SELECT DISTINCT is combined with window function {}() in the same SELECT list; \
                 the window is evaluated before de-duplication, so the query fails or returns \
                 different rows on Databricks",
                name
            ),
            suggestion: None,
        });
    }
    flags
}

fn aggregate_in_window_order_by(shape: &StatementShape<'_>) -> Vec<SemanticFlag> {
    let all: Vec<usize> = (0..shape.len()).collect();
    let mut flags = Vec::new();
    for window in shape.window_calls(&all) {
        let Some((open, close)) = window.spec else {
            continue;
        };
        let inner = shape.depth[open] + 1;
        let Some(order) = (open + 1..close).find(|&j| {
            shape.depth[j] == inner && shape.word_at(j, "ORDER") && shape.word_at(j + 1, "BY")
        }) else {
            continue;
        };
        let frame = (order + 2..close)
            .find(|&j| {
                shape.depth[j] == inner && (shape.word_at(j, "ROWS") || shape.word_at(j, "RANGE"))
            })
            .unwrap_or(close);
        let order_by = shape.walk(order + 2, frame);
        for (name, call_close) in shape.aggregate_calls(&order_by) {
            flags.push(SemanticFlag {
                pattern: "aggregate-in-window-order-by".to_string(),
                severity: Severity::AutoFixable,
                span: shape.span(name, call_close),
                explanation: format!(
                    "aggregate {}() is used inside the ORDER BY of window function {}()",
                    shape.sig[name].text, shape.sig[window.name].text
                ),
                suggestion: Some(
                    "hoist aggregate into a preceding CTE and order the window by its column"
                        .to_string(),
                ),
            });
        }
    }
    flags
}

fn mixed_aggregate_window(shape: &StatementShape<'_>) -> Vec<SemanticFlag> {
    let mut flags = Vec::new();
    for block in shape.blocks() {
        let list = shape.walk(block.list.0, block.list.1);
        let windows = shape.window_calls(&list);
        if windows.is_empty() {
            continue;
        }
        // aggregates inside an OVER (...) are reported by the ORDER BY check
        let in_spec = |i: usize| {
            windows
                .iter()
                .filter_map(|w| w.spec)
                .any(|(open, close)| open < i && i < close)
        };
        let outside: Vec<usize> = list.into_iter().filter(|&i| !in_spec(i)).collect();
        let aggregates = shape.aggregate_calls(&outside);
        let Some(&(first, _)) = aggregates.first() else {
            continue;
        };
        let last = block.list.1.saturating_sub(1).max(first);
        flags.push(SemanticFlag {
            pattern: "mixed-aggregate-window".to_string(),
            severity: Severity::AutoFixable,
            span: shape.span(first.min(windows[0].name), last),
            explanation: format!(
                "aggregate {}() and window function {}() are mixed in the same SELECT list",
                shape.sig[first].text, shape.sig[windows[0].name].text
            ),
            suggestion: Some(
                "compute the aggregate in a preceding CTE, then apply the window function over it"
                    .to_string(),
            ),
        });
    }
    flags
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubqueryPosition {
    Derived,
    Predicate,
    Other,
}

fn correlated_subquery(shape: &StatementShape<'_>) -> Vec<SemanticFlag> {
    let mut flags = Vec::new();
    for open in 0..shape.len() {
        if !shape.is_subquery_open(open) || !shape.word_at(open + 1, "SELECT") {
            continue;
        }
        let Some(close) = shape.close_of(open) else {
            continue;
        };
        let Some(inner) = shape.blocks().iter().find(|b| b.select == open + 1) else {
            continue;
        };
        let Some(outer) = shape.enclosing_block(open) else {
            continue;
        };

        let within = |range: Option<(usize, usize)>| {
            range.is_some_and(|(lo, hi)| lo <= open && open < hi)
        };
        let position = if within(outer.from) {
            SubqueryPosition::Derived
        } else if within(outer.where_clause) || within(outer.having) {
            SubqueryPosition::Predicate
        } else {
            SubqueryPosition::Other
        };
        if position == SubqueryPosition::Derived {
            continue;
        }

        // names visible outside, including every enclosing block
        let mut outer_names = BTreeSet::new();
        let mut current = Some(outer);
        while let Some(block) = current {
            outer_names.extend(shape.from_names(block));
            current = shape.enclosing_block(block.select);
        }
        let inner_names: BTreeSet<String> = shape
            .blocks()
            .iter()
            .filter(|b| b.select > open && b.select < close)
            .flat_map(|b| shape.from_names(b))
            .collect();

        let references: Vec<usize> = (open + 1..close)
            .filter(|&j| {
                let tok = shape.sig[j];
                tok.kind == TokenKind::Identifier
                    && shape.punct_at(j + 1, ".")
                    && !(j > 0 && shape.punct_at(j - 1, "."))
                    && shape
                        .token(j + 2)
                        .is_some_and(|t| t.kind == TokenKind::Identifier)
            })
            .filter(|&j| {
                let qualifier = shape.sig[j].ident_name();
                outer_names.contains(&qualifier) && !inner_names.contains(&qualifier)
            })
            .collect();
        if references.is_empty() {
            continue;
        }

        let reason = match position {
            SubqueryPosition::Predicate => non_rewritable_reason(shape, inner, &references),
            _ => Some("the correlation appears outside a WHERE/HAVING predicate"),
        };
        let Some(reason) = reason else {
            continue;
        };
        let outer_refs: Vec<String> = references
            .iter()
            .map(|&j| format!("{}.{}", shape.sig[j].text, shape.sig[j + 2].text))
            .collect();
        flags.push(SemanticFlag {
            pattern: "correlated-subquery".to_string(),
            severity: Severity::ManualReviewRequired,
            span: shape.span(open, close),
            explanation: format!(
                "subquery is correlated through {} and cannot be rewritten as a join: {}",
                outer_refs.join(", "),
                reason
            ),
            suggestion: None,
        });
    }
    flags
}

/// Why a predicate subquery's correlation is not a plain equi-join, if it is not
fn non_rewritable_reason(
    shape: &StatementShape<'_>,
    inner: &SelectBlock,
    references: &[usize],
) -> Option<&'static str> {
    let Some((lo, hi)) = inner.where_clause else {
        return Some("the correlation is not part of the subquery's WHERE clause");
    };
    for &j in references {
        if j < lo || j >= hi || shape.depth[j] != inner.depth {
            return Some("the correlation is not a top-level WHERE predicate of the subquery");
        }
        let eq_after = shape.token(j + 3).is_some_and(|t| t.is_operator("="));
        let eq_before = j > 0 && shape.sig[j - 1].is_operator("=");
        if !(eq_after || eq_before) {
            return Some("the correlation predicate is not an equality");
        }
    }
    if shape
        .walk(lo, hi)
        .into_iter()
        .any(|j| shape.word_at(j, "OR"))
    {
        return Some("the correlation predicate is combined with OR");
    }
    None
}

#[cfg(test)]
#[path = "semantic_test.rs"]
mod tests;
