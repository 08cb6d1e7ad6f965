//! HiveQL rules

use super::HIVE;
use crate::catalog::RewriteRule;
use crate::matcher::{
    absorb_whitespace, ctas_as, depths, is_statement_start, split_args, text_of, Cursor, Edit,
    RuleMatch,
};
use crate::token::{Token, TokenKind};

pub(super) fn rules() -> Vec<RewriteRule> {
    vec![
        RewriteRule {
            name: "remove-session-set",
            dialects: HIVE,
            priority: 0,
            after: &[],
            rationale: "SET hive.*/mapreduce.*/tez.* session settings have no Databricks meaning",
            matcher: remove_session_set,
        },
        RewriteRule {
            name: "remove-add-jar",
            dialects: HIVE,
            priority: 0,
            after: &[],
            rationale: "ADD JAR/FILE resources are managed as cluster libraries in Databricks",
            matcher: remove_add_jar,
        },
        RewriteRule {
            name: "temporary-function-placeholder",
            dialects: HIVE,
            priority: 0,
            after: &[],
            rationale: "Java-backed temporary functions become SQL UDF placeholders to reimplement",
            matcher: temporary_function_placeholder,
        },
        RewriteRule {
            name: "remove-hive-hints",
            dialects: HIVE,
            priority: 10,
            after: &[],
            rationale: "MAPJOIN/STREAMTABLE hints are Hive execution hints; the optimizer decides",
            matcher: remove_hive_hints,
        },
        RewriteRule {
            name: "ctas-drop-partitioned-by",
            dialects: HIVE,
            priority: 20,
            after: &[],
            rationale: "Databricks CTAS cannot declare typed partition columns",
            matcher: ctas_drop_partitioned_by,
        },
        RewriteRule {
            name: "clustered-by-buckets",
            dialects: HIVE,
            priority: 20,
            after: &[],
            rationale: "Hive bucketing (CLUSTERED BY ... INTO n BUCKETS) is dropped from CTAS",
            matcher: clustered_by_buckets,
        },
        RewriteRule {
            name: "distribute-by-to-cluster-by",
            dialects: HIVE,
            priority: 30,
            after: &["clustered-by-buckets", "ctas-drop-partitioned-by"],
            rationale: "DISTRIBUTE BY/SORT BY in a CTAS becomes liquid clustering on the table",
            matcher: distribute_by_to_cluster_by,
        },
        RewriteRule {
            name: "storage-format-to-iceberg",
            dialects: HIVE,
            priority: 40,
            after: &[],
            rationale: "STORED AS ORC/PARQUET and USING PARQUET/ORC become managed Iceberg tables",
            matcher: storage_format_to_iceberg,
        },
        RewriteRule {
            name: "tblproperties-to-options",
            dialects: HIVE,
            priority: 40,
            after: &["clustered-by-buckets"],
            rationale: "TBLPROPERTIES(...) becomes OPTIONS(...)",
            matcher: tblproperties_to_options,
        },
    ]
}

/// Session namespaces whose `SET` statements are dropped
const SESSION_NAMESPACES: &[&str] = &["hive", "mapreduce", "mapred", "tez"];

/// Replace everything from `pos` to the end of the statement
fn drop_rest(tokens: &[Token], pos: usize) -> RuleMatch {
    RuleMatch::single(Edit::delete(pos, tokens.len()))
}

fn remove_session_set(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if !is_statement_start(tokens, pos) || !tokens[pos].is_word_ci("SET") {
        return None;
    }
    let mut cursor = Cursor::new(tokens, pos + 1);
    cursor.any_word(SESSION_NAMESPACES)?;
    cursor.punct(".")?;
    Some(drop_rest(tokens, pos))
}

fn remove_add_jar(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if !is_statement_start(tokens, pos) || !tokens[pos].is_word_ci("ADD") {
        return None;
    }
    Cursor::new(tokens, pos + 1).any_word(&["JAR", "JARS", "FILE", "FILES", "ARCHIVE", "ARCHIVES"])?;
    Some(drop_rest(tokens, pos))
}

fn temporary_function_placeholder(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if !is_statement_start(tokens, pos) || !tokens[pos].is_word_ci("CREATE") {
        return None;
    }
    let mut cursor = Cursor::new(tokens, pos + 1);
    cursor.any_word(&["TEMPORARY", "TEMP"])?;
    cursor.word("FUNCTION")?;
    let (first, last) = cursor.qualified_name()?;
    cursor.word("AS")?;
    let class = cursor.string()?;

    let name = text_of(tokens, first, last + 1);
    let class = tokens[class].string_value().unwrap_or_default();
    let lowered = name.to_lowercase();
    let body = if lowered.contains("text") || lowered.contains("normalize") {
        format!(
            "CREATE OR REPLACE FUNCTION {}(text STRING) RETURNS STRING RETURN lower(trim(text))",
            name
        )
    } else {
        format!(
            "CREATE OR REPLACE FUNCTION {}(input STRING) RETURNS DOUBLE RETURN CAST(NULL AS DOUBLE)",
            name
        )
    };
    let replacement = format!(
        "-- TODO(sparkport): reimplement Hive UDF {} ({}) as a SQL or Python UDF\n{}",
        name, class, body
    );
    Some(RuleMatch::single(Edit::replace(pos, tokens.len(), replacement)))
}

fn remove_hive_hints(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    let tok = &tokens[pos];
    if !tok.is_hint() {
        return None;
    }
    let upper = tok.text.to_ascii_uppercase();
    if !upper.contains("MAPJOIN") && !upper.contains("STREAMTABLE") {
        return None;
    }
    let (start, end) = absorb_whitespace(tokens, pos, pos + 1);
    Some(RuleMatch::single(Edit::delete(start, end)))
}

fn ctas_drop_partitioned_by(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if pos >= ctas_as(tokens)? {
        return None;
    }
    let mut cursor = Cursor::new(tokens, pos);
    cursor.words(&["PARTITIONED", "BY"])?;
    let group = cursor.group()?;

    // Only typed column lists (`dt STRING`); bare column references are valid
    let typed = split_args(tokens, group)
        .into_iter()
        .any(|(lo, hi)| tokens[lo..hi].iter().filter(|t| t.is_significant()).count() > 1);
    if !typed {
        return None;
    }
    let (start, end) = absorb_whitespace(tokens, pos, group.close + 1);
    Some(RuleMatch::single(Edit::delete(start, end)))
}

fn clustered_by_buckets(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if pos >= ctas_as(tokens)? {
        return None;
    }
    let mut cursor = Cursor::new(tokens, pos);
    cursor.words(&["CLUSTERED", "BY"])?;
    cursor.group()?;
    if cursor.words(&["SORTED", "BY"]).is_some() {
        cursor.group()?;
    }
    cursor.word("INTO")?;
    cursor.number()?;
    let last = cursor.word("BUCKETS")?;
    let (start, end) = absorb_whitespace(tokens, pos, last + 1);
    Some(RuleMatch::single(Edit::delete(start, end)))
}

fn distribute_by_to_cluster_by(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    let as_idx = ctas_as(tokens)?;
    if pos <= as_idx || depths(tokens)[pos] != 0 {
        return None;
    }
    let mut cursor = Cursor::new(tokens, pos);
    cursor.words(&["DISTRIBUTE", "BY"])?;

    let mut columns: Vec<String> = Vec::new();
    loop {
        let (_, last) = cursor.qualified_name()?;
        let column = tokens[last].text.clone();
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
            columns.push(column);
        }
        if cursor.punct(",").is_none() {
            break;
        }
    }

    if cursor.words(&["SORT", "BY"]).is_some() {
        loop {
            cursor.qualified_name()?;
            cursor.any_word(&["ASC", "DESC"]);
            if cursor.punct(",").is_none() {
                break;
            }
        }
    }

    // The clause must close the statement
    let end = cursor.pos();
    if tokens[end..].iter().any(Token::is_significant) {
        return None;
    }

    let start = if pos > 0 && tokens[pos - 1].kind == TokenKind::Whitespace {
        pos - 1
    } else {
        pos
    };
    Some(RuleMatch::new(vec![
        Edit::insert(as_idx, format!("CLUSTER BY ({})\n", columns.join(", "))),
        Edit::delete(start, end),
    ]))
}

fn storage_format_to_iceberg(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    const FORMATS: &[&str] = &["ORC", "PARQUET", "AVRO"];
    let mut cursor = Cursor::new(tokens, pos);
    let format = if cursor.words(&["STORED", "AS"]).is_some() {
        cursor.any_word(FORMATS)?
    } else {
        cursor.word("USING")?;
        cursor.any_word(FORMATS)?
    };
    Some(RuleMatch::single(Edit::replace(pos, format + 1, "USING ICEBERG")))
}

fn tblproperties_to_options(tokens: &[Token], pos: usize) -> Option<RuleMatch> {
    if !tokens[pos].is_word_ci("TBLPROPERTIES") {
        return None;
    }
    Cursor::new(tokens, pos + 1).group()?;
    Some(RuleMatch::single(Edit::replace(pos, pos + 1, "OPTIONS")))
}
