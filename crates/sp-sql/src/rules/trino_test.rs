use crate::catalog::RuleCatalog;
use crate::engine::{RewriteEngine, DEFAULT_MAX_PASSES};
use sp_core::SourceDialect;
use std::sync::Arc;

fn trino(sql: &str) -> String {
    let catalog = Arc::new(RuleCatalog::builtin().unwrap());
    RewriteEngine::new(catalog, DEFAULT_MAX_PASSES)
        .unwrap()
        .rewrite(sql, SourceDialect::Trino)
        .unwrap()
        .sql
}

#[test]
fn test_type_renames() {
    assert_eq!(trino("CAST(x AS VARCHAR(255))"), "CAST(x AS STRING)");
    assert_eq!(trino("CAST(x AS varchar)"), "CAST(x AS STRING)");
    assert_eq!(trino("CAST(b AS VARBINARY)"), "CAST(b AS BINARY)");
    // CHAR(n) is a native Databricks type
    assert_eq!(trino("CAST(c AS CHAR(2))"), "CAST(c AS CHAR(2))");
    // A column that happens to be called varchar
    assert_eq!(trino("SELECT t.varchar FROM t"), "SELECT t.varchar FROM t");
}

#[test]
fn test_function_renames() {
    assert_eq!(trino("SELECT cardinality(tags) FROM t"), "SELECT size(tags) FROM t");
    assert_eq!(
        trino("SELECT json_extract_scalar(payload, '$.a') FROM t"),
        "SELECT get_json_object(payload, '$.a') FROM t"
    );
    assert_eq!(
        trino("SELECT approx_percentile(latency, 0.95) FROM t"),
        "SELECT percentile_approx(latency, 0.95) FROM t"
    );
    assert_eq!(trino("SELECT arbitrary(name) FROM t"), "SELECT first(name) FROM t");
    // Not a call: left alone
    assert_eq!(trino("SELECT cardinality FROM t"), "SELECT cardinality FROM t");
}

#[test]
fn test_array_agg_variants() {
    assert_eq!(
        trino("SELECT array_agg(DISTINCT user_id), array_agg(event ORDER BY ts) FROM e"),
        "SELECT collect_set(user_id), collect_list(event ORDER BY ts) FROM e"
    );
}

#[test]
fn test_date_functions() {
    assert_eq!(
        trino("SELECT date_add('day', 7, order_date) FROM o"),
        "SELECT date_add(order_date, 7) FROM o"
    );
    assert_eq!(
        trino("SELECT date_add('month', -1, d) FROM o"),
        "SELECT add_months(d, -1) FROM o"
    );
    assert_eq!(
        trino("SELECT date_add('year', n + 1, d) FROM o"),
        "SELECT add_months(d, (n + 1) * 12) FROM o"
    );
    assert_eq!(
        trino("SELECT date_diff('day', start_date, end_date) FROM o"),
        "SELECT datediff(end_date, start_date) FROM o"
    );
    // Units without a direct equivalent are left for validation
    let hourly = "SELECT date_add('hour', 1, ts) FROM o";
    assert_eq!(trino(hourly), hourly);
}

#[test]
fn test_unnest_to_lateral_view() {
    assert_eq!(
        trino("SELECT id, tag FROM t CROSS JOIN UNNEST(tags) AS x(tag)"),
        "SELECT id, tag FROM t LATERAL VIEW explode(tags) x AS tag"
    );
    assert_eq!(
        trino("SELECT * FROM t CROSS JOIN UNNEST(items) WITH ORDINALITY AS u(item, pos)"),
        "SELECT * FROM t LATERAL VIEW posexplode(items) u AS pos, item"
    );
    assert_eq!(
        trino("SELECT * FROM t CROSS JOIN UNNEST(attrs) AS m(k, v)"),
        "SELECT * FROM t LATERAL VIEW explode(attrs) m AS k, v"
    );
}

#[test]
fn test_structural_rewrites() {
    assert_eq!(trino("SELECT ROW(1, 'a')"), "SELECT STRUCT(1, 'a')");
    assert_eq!(
        trino("SELECT CAST(MAP(ARRAY['k'], ARRAY[1]) AS JSON)"),
        "SELECT to_json(MAP(ARRAY['k'], ARRAY[1]))"
    );
    assert_eq!(
        trino("SELECT now() - INTERVAL '7' DAY"),
        "SELECT now() - INTERVAL 7 DAY"
    );
    // Frame clause ROW is not a constructor
    let frame = "SELECT sum(x) OVER (ORDER BY d ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) FROM t";
    assert_eq!(trino(frame), frame);
}

#[test]
fn test_table_properties_to_iceberg() {
    assert_eq!(
        trino(
            "CREATE TABLE t WITH (format = 'ORC', partitioned_by = ARRAY['ds', 'region'], orc_bloom_filter_columns = 'id') AS SELECT * FROM s"
        ),
        "CREATE TABLE t USING ICEBERG PARTITIONED BY (ds, region) OPTIONS ('orc_bloom_filter_columns' = 'id') AS SELECT * FROM s"
    );
    assert_eq!(
        trino("CREATE TABLE t (a BIGINT) WITH (format = 'PARQUET')"),
        "CREATE TABLE t (a BIGINT) USING ICEBERG"
    );
    // A CTE is not a property block
    let cte = "CREATE TABLE t AS WITH x AS (SELECT 1 AS a) SELECT a FROM x";
    assert_eq!(trino(cte), cte);
}

#[test]
fn test_double_quoted_identifiers_become_backticks() {
    // Quoted names are identifiers, never rule triggers
    assert_eq!(
        trino("SELECT \"cardinality\"(x), \"VARCHAR\" FROM t"),
        "SELECT `cardinality`(x), `VARCHAR` FROM t"
    );
    assert_eq!(
        trino("SELECT \"o\".\"id\" FROM orders \"o\" ORDER BY \"order\""),
        "SELECT `o`.`id` FROM orders `o` ORDER BY `order`"
    );
    assert_eq!(trino("SELECT \"say \"\"hi\"\"\" FROM t"), "SELECT `say \"hi\"` FROM t");
    assert_eq!(trino("SELECT \"a`b\" FROM t"), "SELECT `a``b` FROM t");
    // Strings stay strings
    assert_eq!(trino("SELECT 'x' AS \"label\""), "SELECT 'x' AS `label`");
}

#[test]
fn test_row_type_becomes_struct_type() {
    assert_eq!(
        trino("SELECT CAST(x AS ROW(a INT, b VARCHAR(3))) FROM t"),
        "SELECT CAST(x AS STRUCT<a: INT, b: STRING>) FROM t"
    );
    assert_eq!(
        trino("CREATE TABLE t (s ROW(id BIGINT, tag VARCHAR))"),
        "CREATE TABLE t (s STRUCT<id: BIGINT, tag: STRING>)"
    );
    // Constructor after the AS of a CTAS stays a call
    assert_eq!(
        trino("CREATE TABLE t AS SELECT ROW(1, 2) AS r"),
        "CREATE TABLE t AS SELECT STRUCT(1, 2) AS r"
    );
    // Anonymous fields are left for the syntax gate
    assert_eq!(
        trino("SELECT CAST(x AS ROW(INT, INT))"),
        "SELECT CAST(x AS ROW(INT, INT))"
    );
}
