use super::*;

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.source_dir, "sql");
    assert_eq!(config.output_dir, "converted");
    assert_eq!(config.default_dialect, SourceDialect::Hive);
    assert_eq!(config.rewrite.max_passes, 8);
    assert!(config.escalation.enabled);
    assert_eq!(config.escalation.ai_model, "databricks-claude-sonnet-4-5");
    assert_eq!(config.escalation.max_prompt_chars, 3000);
    assert_eq!(config.service.timeout(), Duration::from_secs(60));
    assert_eq!(config.service.max_retries, 2);
    assert_eq!(config.service.retry_backoff(), Duration::from_millis(500));
    assert_eq!(config.warehouse.host_env, "DATABRICKS_HOST");
    assert_eq!(config.warehouse.token_env, "DATABRICKS_TOKEN");
    assert_eq!(config.workers, 4);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_empty_is_default() {
    assert_eq!(Config::parse("").unwrap(), Config::default());
    assert_eq!(Config::parse("  \n").unwrap(), Config::default());
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
source_dir: scripts
output_dir: out
default_dialect: trino
extensions:
  hql: hive
  presto: trino
  sql: trino
rewrite:
  max_passes: 4
escalation:
  enabled: false
service:
  timeout_secs: 10
  max_retries: 0
warehouse:
  warehouse_id: abc123
  catalog: main
  schema: migration
workers: 8
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.source_dir, "scripts");
    assert_eq!(config.default_dialect, SourceDialect::Trino);
    assert_eq!(config.extensions.len(), 3);
    assert_eq!(config.rewrite.max_passes, 4);
    assert!(!config.escalation.enabled);
    assert_eq!(config.escalation.max_prompt_chars, 3000);
    assert_eq!(config.service.timeout_secs, 10);
    assert_eq!(config.service.max_retries, 0);
    assert_eq!(config.service.retry_backoff_ms, 500);
    assert_eq!(config.warehouse.resolve_warehouse_id().as_deref(), Some("abc123"));
    assert_eq!(config.warehouse.catalog.as_deref(), Some("main"));
    assert_eq!(config.workers, 8);
}

#[test]
fn test_unknown_field_rejected() {
    let result = Config::parse("sauce_dir: sql\n");
    assert!(matches!(result, Err(CoreError::ConfigParseError { .. })));
}

#[test]
fn test_unknown_dialect_rejected() {
    let result = Config::parse("default_dialect: snowflake\n");
    assert!(matches!(result, Err(CoreError::ConfigParseError { .. })));
}

#[test]
fn test_validate_rejects_zero_passes() {
    let result = Config::parse("rewrite:\n  max_passes: 0\n");
    match result {
        Err(CoreError::ConfigInvalid { message }) => assert!(message.contains("max_passes")),
        other => panic!("expected ConfigInvalid, got {:?}", other),
    }
}

#[test]
fn test_validate_rejects_zero_workers() {
    let result = Config::parse("workers: 0\n");
    assert!(matches!(result, Err(CoreError::ConfigInvalid { .. })));
}

#[test]
fn test_validate_rejects_dotted_extension() {
    let result = Config::parse("extensions:\n  .hql: hive\n");
    assert!(matches!(result, Err(CoreError::ConfigInvalid { .. })));
}

#[test]
fn test_dialect_for() {
    let config = Config::default();
    assert_eq!(config.dialect_for(Path::new("a/b.hql")), SourceDialect::Hive);
    assert_eq!(config.dialect_for(Path::new("a/b.TRINO")), SourceDialect::Trino);
    // Built-in extension fallback
    assert_eq!(config.dialect_for(Path::new("a/b.presto")), SourceDialect::Trino);
    // Plain .sql uses the default
    assert_eq!(config.dialect_for(Path::new("a/b.sql")), SourceDialect::Hive);

    let trino_default = Config::parse("default_dialect: trino\n").unwrap();
    assert_eq!(trino_default.dialect_for(Path::new("q.sql")), SourceDialect::Trino);
}

#[test]
fn test_is_source_file() {
    let config = Config::default();
    assert!(config.is_source_file(Path::new("x.sql")));
    assert!(config.is_source_file(Path::new("x.HQL")));
    assert!(config.is_source_file(Path::new("x.trino")));
    assert!(!config.is_source_file(Path::new("x.json")));
    assert!(!config.is_source_file(Path::new("Makefile")));
}

#[test]
fn test_load_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sparkport.yaml"), "workers: 2\n").unwrap();

    let config = Config::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.workers, 2);
}

#[test]
fn test_load_from_dir_missing() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load_from_dir(dir.path());
    assert!(matches!(result, Err(CoreError::ConfigNotFound { .. })));

    let config = Config::load_or_default(dir.path()).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_absolute_dirs() {
    let config = Config::default();
    let root = PathBuf::from("/tmp/project");
    assert_eq!(config.source_dir_absolute(&root), root.join("sql"));
    assert_eq!(config.output_dir_absolute(&root), root.join("converted"));
}
