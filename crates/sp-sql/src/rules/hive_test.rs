use crate::catalog::RuleCatalog;
use crate::engine::{RewriteEngine, RewriteOutput, DEFAULT_MAX_PASSES};
use sp_core::SourceDialect;
use std::sync::Arc;

fn hive(sql: &str) -> RewriteOutput {
    let catalog = Arc::new(RuleCatalog::builtin().unwrap());
    RewriteEngine::new(catalog, DEFAULT_MAX_PASSES)
        .unwrap()
        .rewrite(sql, SourceDialect::Hive)
        .unwrap()
}

#[test]
fn test_session_set_removed() {
    assert_eq!(hive("SET hive.exec.dynamic.partition=true").sql, "");
    assert_eq!(hive("set mapreduce.job.reduces = 10").sql, "");
    assert_eq!(hive("SET tez.queue.name=etl").sql, "");
    // Spark settings are kept
    assert_eq!(
        hive("SET spark.sql.shuffle.partitions=200").sql,
        "SET spark.sql.shuffle.partitions=200"
    );
}

#[test]
fn test_add_jar_removed() {
    let out = hive("ADD JAR hdfs:///libs/udfs.jar");
    assert_eq!(out.sql, "");
    assert_eq!(out.rules_applied(), vec!["remove-add-jar"]);
}

#[test]
fn test_temporary_function_placeholders() {
    let out = hive("CREATE TEMPORARY FUNCTION normalize_text AS 'com.acme.udf.NormalizeText'");
    assert!(out.sql.starts_with("-- TODO(sparkport): reimplement Hive UDF normalize_text"));
    assert!(out.sql.contains("com.acme.udf.NormalizeText"));
    assert!(out.sql.ends_with(
        "CREATE OR REPLACE FUNCTION normalize_text(text STRING) RETURNS STRING RETURN lower(trim(text))"
    ));

    let out = hive("CREATE TEMPORARY FUNCTION risk_score AS 'com.acme.Risk' USING JAR 'x.jar'");
    assert!(out.sql.ends_with(
        "CREATE OR REPLACE FUNCTION risk_score(input STRING) RETURNS DOUBLE RETURN CAST(NULL AS DOUBLE)"
    ));
}

#[test]
fn test_hints_removed() {
    let out = hive("SELECT /*+ MAPJOIN(d) */ a FROM f JOIN d ON f.k = d.k");
    assert_eq!(out.sql, "SELECT a FROM f JOIN d ON f.k = d.k");

    let out = hive("SELECT a FROM f JOIN d ON f.k = d.k /*+ STREAMTABLE(f) */");
    assert_eq!(out.sql, "SELECT a FROM f JOIN d ON f.k = d.k");

    // Other hints and ordinary comments stay
    let out = hive("SELECT /*+ BROADCAST(d) */ a /* MAPJOIN note */ FROM d");
    assert!(!out.changed());
}

#[test]
fn test_ctas_clustered_by_dropped() {
    let out = hive(
        "CREATE TABLE t\nCLUSTERED BY (id) SORTED BY (ts) INTO 32 BUCKETS\nSTORED AS ORC\nAS SELECT id, ts FROM s",
    );
    assert_eq!(out.sql, "CREATE TABLE t\nUSING ICEBERG\nAS SELECT id, ts FROM s");
}

#[test]
fn test_non_ctas_clustered_by_kept() {
    let sql = "CREATE TABLE t (id INT) CLUSTERED BY (id) INTO 4 BUCKETS";
    assert_eq!(hive(sql).sql, sql);
}

#[test]
fn test_typed_partitioned_by_dropped_from_ctas() {
    let out = hive("CREATE TABLE t PARTITIONED BY (dt STRING) AS SELECT a, dt FROM s");
    assert_eq!(out.sql, "CREATE TABLE t AS SELECT a, dt FROM s");

    let untyped = "CREATE TABLE t PARTITIONED BY (dt) AS SELECT a, dt FROM s";
    assert_eq!(hive(untyped).sql, untyped);
}

#[test]
fn test_distribute_by_moves_to_cluster_by() {
    let out = hive(
        "CREATE TABLE t STORED AS PARQUET AS SELECT a, b FROM s DISTRIBUTE BY s.a, b, A SORT BY b DESC",
    );
    assert_eq!(
        out.sql,
        "CREATE TABLE t USING ICEBERG CLUSTER BY (a, b)\nAS SELECT a, b FROM s"
    );
}

#[test]
fn test_distribute_by_outside_ctas_kept() {
    let sql = "INSERT OVERWRITE TABLE t SELECT a FROM s DISTRIBUTE BY a";
    assert_eq!(hive(sql).sql, sql);

    // Inside a subquery the clause is not the table's
    let sql = "CREATE TABLE t AS SELECT * FROM (SELECT a FROM s DISTRIBUTE BY a) x";
    assert_eq!(hive(sql).sql, sql);
}

#[test]
fn test_storage_formats() {
    assert_eq!(
        hive("CREATE TABLE t (a INT) STORED AS ORC").sql,
        "CREATE TABLE t (a INT) USING ICEBERG"
    );
    assert_eq!(
        hive("CREATE TABLE t (a INT) USING parquet").sql,
        "CREATE TABLE t (a INT) USING ICEBERG"
    );
    let sql = "SELECT * FROM a JOIN b USING (id)";
    assert_eq!(hive(sql).sql, sql);
}

#[test]
fn test_tblproperties_to_options() {
    let out = hive("CREATE TABLE t (a INT) TBLPROPERTIES ('orc.compress'='SNAPPY')");
    assert_eq!(out.sql, "CREATE TABLE t (a INT) OPTIONS ('orc.compress'='SNAPPY')");
}

#[test]
fn test_full_ctas() {
    let sql = "CREATE TABLE sales_summary\n\
               CLUSTERED BY (region) INTO 16 BUCKETS\n\
               STORED AS ORC\n\
               TBLPROPERTIES ('transactional'='false')\n\
               AS\n\
               SELECT region, CAST(total AS VARCHAR(20)) AS total\n\
               FROM sales\n\
               DISTRIBUTE BY region";
    let out = hive(sql);
    assert_eq!(
        out.sql,
        "CREATE TABLE sales_summary\n\
         USING ICEBERG\n\
         OPTIONS ('transactional'='false')\n\
         CLUSTER BY (region)\n\
         AS\n\
         SELECT region, CAST(total AS STRING) AS total\n\
         FROM sales"
    );
}
