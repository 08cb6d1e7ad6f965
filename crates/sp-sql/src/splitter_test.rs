use super::*;

fn texts(unit: &SourceUnit) -> Vec<String> {
    unit.statements().map(Statement::text).collect()
}

#[test]
fn test_split_simple() {
    let sql = "SELECT 1;\nSELECT 2;\n";
    let unit = split("u", sql, SourceDialect::Hive);
    assert_eq!(texts(&unit), vec!["SELECT 1", "SELECT 2"]);
    assert_eq!(unit.reconstruct(), sql);
    let indexes: Vec<usize> = unit.statements().map(|s| s.index).collect();
    assert_eq!(indexes, vec![0, 1]);
}

#[test]
fn test_terminators_inside_literals_comments_and_parens_do_not_split() {
    let sql = "SELECT ';' AS a -- x; y\n, (SELECT 1; ) /* ; */ FROM t;SELECT 2";
    let unit = split("u", sql, SourceDialect::Hive);
    assert_eq!(unit.statement_count(), 2);
    assert_eq!(unit.reconstruct(), sql);
    assert!(texts(&unit)[0].ends_with("FROM t"));
}

#[test]
fn test_trivia_only_pieces_are_not_statements() {
    let sql = "-- header comment\n;;\n\nSELECT 1;\n/* trailing */\n";
    let unit = split("u", sql, SourceDialect::Trino);
    assert_eq!(texts(&unit), vec!["SELECT 1"]);
    assert_eq!(unit.reconstruct(), sql);
}

#[test]
fn test_missing_final_terminator() {
    let sql = "SELECT 1;\n  SELECT 2  \n";
    let unit = split("u", sql, SourceDialect::Hive);
    assert_eq!(texts(&unit), vec!["SELECT 1", "SELECT 2"]);
    assert_eq!(unit.reconstruct(), sql);
}

#[test]
fn test_statement_spans_index_into_unit() {
    let sql = "SELECT 1;\n\nSELECT  2;";
    let unit = split("u", sql, SourceDialect::Hive);
    for stmt in unit.statements() {
        assert_eq!(&sql[stmt.span.start..stmt.span.end], stmt.text());
        assert_eq!(stmt.tokens[0].span.start, 0);
    }
}

#[test]
fn test_unterminated_literal_marks_statement_unparseable() {
    let sql = "SELECT 1;\nSELECT 'oops; SELECT 3;";
    let unit = split("u", sql, SourceDialect::Hive);
    let stmts: Vec<&Statement> = unit.statements().collect();
    assert_eq!(stmts.len(), 2);
    assert!(stmts[0].unparseable_reason().is_none());
    let reason = stmts[1].unparseable_reason().unwrap();
    assert!(reason.contains("string literal"));
    assert_eq!(unit.reconstruct(), sql);
}

#[test]
fn test_empty_input() {
    let unit = split("u", "", SourceDialect::Hive);
    assert_eq!(unit.statement_count(), 0);
    assert_eq!(unit.reconstruct(), "");
}

#[test]
fn test_display_names() {
    let sql = "CREATE TABLE IF NOT EXISTS db.orders AS SELECT 1;\n\
               CREATE OR REPLACE TEMPORARY VIEW v_x AS SELECT 2;\n\
               -- lead\nCREATE TEMPORARY FUNCTION clean_text AS 'com.x.Clean';\n\
               INSERT INTO t SELECT 3";
    let unit = split("u", sql, SourceDialect::Hive);
    let names: Vec<String> = unit.statements().map(Statement::display_name).collect();
    assert_eq!(names, vec!["db.orders", "v_x", "clean_text", "query_4"]);
}
