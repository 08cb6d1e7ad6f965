//! Trino / Presto rules

use super::{rename_call, rename_word, TRINO};
use crate::catalog::RewriteRule;
use crate::matcher::{
    ctas_as, is_create_table, prev_non_ws, split_args, text_of, trim, Cursor, Edit, Group,
    RuleMatch,
};
use crate::token::{Token, TokenKind};

pub(super) fn rules() -> Vec<RewriteRule> {
    vec![
        RewriteRule {
            name: "quoted-identifier-to-backtick",
            dialects: TRINO,
            priority: 10,
            after: &[],
            rationale: "\"name\" becomes `name`; Databricks reads double quotes as a string literal",
            matcher: quoted_identifier_to_backtick,
        },
        RewriteRule {
            name: "table-format-to-iceberg",
            dialects: TRINO,
            priority: 20,
            after: &[],
            rationale: "WITH (format = ..., partitioned_by = ARRAY[...]) becomes USING ICEBERG PARTITIONED BY (...) OPTIONS (...)",
            matcher: table_format_to_iceberg,
        },
        RewriteRule {
            name: "unnest-to-lateral-view",
            dialects: TRINO,
            priority: 30,
            after: &[],
            rationale: "CROSS JOIN UNNEST(a) AS t(x) becomes LATERAL VIEW explode(a) t AS x; WITH ORDINALITY uses posexplode, which counts from 0",
            matcher: unnest_to_lateral_view,
        },
        RewriteRule {
            name: "cast-as-json",
            dialects: TRINO,
            priority: 45,
            after: &[],
            rationale: "CAST(x AS JSON) becomes to_json(x)",
            matcher: cast_as_json,
        },
        RewriteRule {
            name: "varbinary-to-binary",
            dialects: TRINO,
            priority: 50,
            after: &[],
            rationale: "VARBINARY becomes BINARY",
            matcher: |tokens, pos| rename_word(tokens, pos, "VARBINARY", "BINARY"),
        },
        RewriteRule {
            name: "cardinality-to-size",
            dialects: TRINO,
            priority: 50,
            after: &[],
            rationale: "cardinality(x) becomes size(x)",
            matcher: |tokens, pos| rename_call(tokens, pos, "cardinality", "size"),
        },
        RewriteRule {
            name: "json-extract-scalar",
            dialects: TRINO,
            priority: 50,
            after: &[],
            rationale: "json_extract_scalar(expr, path) becomes get_json_object(expr, path)",
            matcher: |tokens, pos| rename_call(tokens, pos, "json_extract_scalar", "get_json_object"),
        },
        RewriteRule {
            name: "array-agg-distinct",
            dialects: TRINO,
            priority: 50,
            after: &[],
            rationale: "array_agg(DISTINCT x) becomes collect_set(x)",
            matcher: array_agg_distinct,
        },
        RewriteRule {
            name: "array-agg",
            dialects: TRINO,
            priority: 50,
            after: &["array-agg-distinct"],
            rationale: "array_agg(x) becomes collect_list(x)",
            matcher: |tokens, pos| rename_call(tokens, pos, "array_agg", "collect_list"),
        },
        RewriteRule {
            name: "approx-percentile",
            dialects: TRINO,
            priority: 50,
            after: &[],
            rationale: "approx_percentile(x, p) becomes percentile_approx(x, p)",
            matcher: |tokens, pos| rename_call(tokens, pos, "approx_percentile", "percentile_approx"),
        },
        RewriteRule {
            name: "arbitrary-to-first",
            dialects: TRINO,
            priority: 50,
            after: &[],
            rationale: "arbitrary(x) becomes first(x)",
            matcher: |tokens, pos| rename_call(tokens, pos, "arbitrary", "first"),
        },
        RewriteRule {
            name: "date-add-unit",
            dialects: TRINO,
            priority: 50,
            after: &[],
            rationale: "date_add('day'|'week'|'month'|'year', n, d) becomes date_add(d, n) or add_months(d, n)",
            matcher: date_add_unit,
        },
        RewriteRule {
            name: "date-diff-unit",
            dialects: TRINO,
            priority: 50,
            after: &[],
            rationale: "date_diff('day', a, b) becomes datediff(b, a)",
            matcher: date_diff_unit,
        },
        RewriteRule {
            name: "row-to-struct",
            dialects: TRINO,
            priority: 60,
            after: &[],
            rationale: "ROW(...) becomes STRUCT(...); the type ROW(a T) becomes STRUCT<a: T>",
            matcher: row_to_struct,
        },
    ]
}

fn quoted_identifier_to_backtick(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    let tok = &tokens[pos];
    if tok.kind != TokenKind::Identifier || !tok.closed || !tok.text.starts_with('"') {
        return None;
    }
    let inner = tok.text.get(1..tok.text.len().checked_sub(1)?)?;
    let name = inner.replace("\"\"", "\"").replace('`', "``");
    Some(RuleMatch::single(Edit::replace(
        pos,
        pos + 1,
        format!("`{}`", name),
    )))
}

fn row_to_struct(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if !tokens[pos].is_word_ci("ROW") {
        return None;
    }
    if !is_type_position(tokens, pos) {
        return rename_call(tokens, pos, "ROW", "STRUCT");
    }
    let group = Cursor::new(tokens, pos + 1).group()?;
    let mut fields = Vec::new();
    for (lo, hi) in split_args(tokens, group) {
        let mut cursor = Cursor::new(tokens, lo);
        let name = cursor.name()?;
        let (type_lo, type_hi) = trim(tokens, cursor.pos(), hi);
        // anonymous fields have no name to carry over
        if type_lo >= type_hi {
            return None;
        }
        fields.push(format!(
            "{}: {}",
            tokens[name].text,
            text_of(tokens, type_lo, type_hi)
        ));
    }
    if fields.is_empty() {
        return None;
    }
    Some(RuleMatch::single(Edit::replace(
        pos,
        group.close + 1,
        format!("STRUCT<{}>", fields.join(", ")),
    )))
}

/// `ROW` used as a type: the target of a cast, or a column type in DDL
fn is_type_position(tokens: &[Token], pos: usize) -> bool {
    if is_create_table(tokens) && ctas_as(tokens).is_none_or(|as_idx| pos < as_idx) {
        return true;
    }
    let Some(prev) = prev_non_ws(tokens, pos) else {
        return false;
    };
    if !tokens[prev].is_word_ci("AS") {
        return false;
    }
    enclosing_open(tokens, prev)
        .and_then(|open| prev_non_ws(tokens, open))
        .is_some_and(|call| tokens[call].is_word_ci("CAST") || tokens[call].is_word_ci("TRY_CAST"))
}

/// Index of the unmatched `(` enclosing `pos`
fn enclosing_open(tokens: &[Token], pos: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..pos).rev() {
        if tokens[i].is_punct(")") {
            depth += 1;
        } else if tokens[i].is_punct("(") {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
    }
    None
}

/// Argument token ranges of the call whose name is at `pos`
fn call_args(tokens: &[Token], pos: usize, name: &str) -> Option<(Group, Vec<(usize, usize)>)> {
    if !tokens[pos].is_word_ci(name) || (pos > 0 && tokens[pos - 1].is_punct(".")) {
        return None;
    }
    let group = Cursor::new(tokens, pos + 1).group()?;
    Some((group, split_args(tokens, group)))
}

/// Lowercase value of an argument that is exactly one string literal
fn unit_arg(tokens: &[Token], (lo, hi): (usize, usize)) -> Option<String> {
    if hi != lo + 1 {
        return None;
    }
    tokens[lo].string_value().map(|v| v.trim().to_lowercase())
}

/// `n * factor`, parenthesising `n` unless it is a single token
fn scaled(tokens: &[Token], (lo, hi): (usize, usize), factor: u32) -> String {
    let n = text_of(tokens, lo, hi);
    if hi == lo + 1 {
        format!("{} * {}", n, factor)
    } else {
        format!("({}) * {}", n, factor)
    }
}

fn date_add_unit(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    let (group, args) = call_args(tokens, pos, "date_add")?;
    if args.len() != 3 {
        return None;
    }
    let n = text_of(tokens, args[1].0, args[1].1);
    let d = text_of(tokens, args[2].0, args[2].1);
    let replacement = match unit_arg(tokens, args[0])?.as_str() {
        "day" => format!("date_add({}, {})", d, n),
        "week" => format!("date_add({}, {})", d, scaled(tokens, args[1], 7)),
        "month" => format!("add_months({}, {})", d, n),
        "year" => format!("add_months({}, {})", d, scaled(tokens, args[1], 12)),
        _ => return None,
    };
    Some(RuleMatch::single(Edit::replace(pos, group.close + 1, replacement)))
}

fn date_diff_unit(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    let (group, args) = call_args(tokens, pos, "date_diff")?;
    if args.len() != 3 || unit_arg(tokens, args[0])? != "day" {
        return None;
    }
    let a = text_of(tokens, args[1].0, args[1].1);
    let b = text_of(tokens, args[2].0, args[2].1);
    Some(RuleMatch::single(Edit::replace(
        pos,
        group.close + 1,
        format!("datediff({}, {})", b, a),
    )))
}

fn array_agg_distinct(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if !tokens[pos].is_word_ci("array_agg") {
        return None;
    }
    let group = Cursor::new(tokens, pos + 1).group()?;
    let mut inner = Cursor::new(tokens, group.open + 1);
    let distinct = inner.word("DISTINCT")?;
    let mut end = distinct + 1;
    while end < group.close && tokens[end].kind == TokenKind::Whitespace {
        end += 1;
    }
    Some(RuleMatch::new(vec![
        Edit::replace(pos, pos + 1, "collect_set"),
        Edit::delete(distinct, end),
    ]))
}

fn cast_as_json(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if !tokens[pos].is_word_ci("CAST") {
        return None;
    }
    let group = Cursor::new(tokens, pos + 1).group()?;
    let (lo, hi) = trim(tokens, group.open + 1, group.close);
    if hi == lo || !tokens[hi - 1].is_word_ci("JSON") {
        return None;
    }
    let as_idx = prev_non_ws(tokens, hi - 1)?;
    if as_idx <= lo || !tokens[as_idx].is_word_ci("AS") {
        return None;
    }
    let (expr_lo, expr_hi) = trim(tokens, lo, as_idx);
    if expr_lo == expr_hi {
        return None;
    }
    Some(RuleMatch::single(Edit::replace(
        pos,
        group.close + 1,
        format!("to_json({})", text_of(tokens, expr_lo, expr_hi)),
    )))
}

fn unnest_to_lateral_view(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    let mut cursor = Cursor::new(tokens, pos);
    cursor.words(&["CROSS", "JOIN", "UNNEST"])?;
    let array = cursor.group()?;
    let array_args = split_args(tokens, array);
    if array_args.len() != 1 {
        return None;
    }
    let ordinality = cursor.words(&["WITH", "ORDINALITY"]).is_some();
    cursor.word("AS");
    let alias = cursor.ident()?;
    let cols = cursor.group()?;
    let columns: Vec<String> = split_args(tokens, cols)
        .into_iter()
        .map(|(lo, hi)| text_of(tokens, lo, hi))
        .collect();
    if columns.is_empty() || columns.iter().any(String::is_empty) {
        return None;
    }

    let arg = text_of(tokens, array_args[0].0, array_args[0].1);
    let alias = &tokens[alias].text;
    let replacement = if ordinality {
        let (ordinal, values) = columns.split_last()?;
        if values.is_empty() {
            return None;
        }
        format!(
            "LATERAL VIEW posexplode({}) {} AS {}, {}",
            arg,
            alias,
            ordinal,
            values.join(", ")
        )
    } else {
        format!("LATERAL VIEW explode({}) {} AS {}", arg, alias, columns.join(", "))
    };
    Some(RuleMatch::single(Edit::replace(pos, cols.close + 1, replacement)))
}

fn table_format_to_iceberg(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if !is_create_table(tokens) || !tokens[pos].is_word_ci("WITH") {
        return None;
    }
    if ctas_as(tokens).is_some_and(|as_idx| pos > as_idx) {
        return None;
    }
    let group = Cursor::new(tokens, pos + 1).group()?;

    let mut partitions: Vec<String> = Vec::new();
    let mut options: Vec<String> = Vec::new();
    for (lo, hi) in split_args(tokens, group) {
        let mut cursor = Cursor::new(tokens, lo);
        let key = cursor.name()?;
        cursor.operator("=")?;
        let (value_lo, value_hi) = trim(tokens, cursor.pos(), hi);
        if value_lo >= value_hi || key >= hi {
            return None;
        }
        let key = tokens[key].ident_name();
        match key.as_str() {
            "format" => {}
            "partitioned_by" => {
                let mut value = Cursor::new(tokens, value_lo);
                value.word("ARRAY")?;
                let list = value.group_of("[")?;
                for (a, b) in split_args(tokens, list) {
                    partitions.push(tokens[a..b].first()?.string_value()?);
                }
            }
            _ => options.push(format!("'{}' = {}", key, text_of(tokens, value_lo, value_hi))),
        }
    }

    let mut replacement = String::from("USING ICEBERG");
    if !partitions.is_empty() {
        replacement.push_str(&format!(" PARTITIONED BY ({})", partitions.join(", ")));
    }
    if !options.is_empty() {
        replacement.push_str(&format!(" OPTIONS ({})", options.join(", ")));
    }
    Some(RuleMatch::single(Edit::replace(pos, group.close + 1, replacement)))
}
