//! Unit tests for mu-query

use mu_core::{CallSiteDef, ClassDef, FunctionDef, ImportDef, Lang, ModuleAst};
use mu_store::GraphStore;

use crate::engine::MuqlEngine;
use crate::{QueryError, QueryResult};

fn import(module: &str) -> ImportDef {
    ImportDef {
        module: module.to_string(),
        names: Vec::new(),
        alias: None,
        is_from: false,
        is_dynamic: false,
        dynamic_pattern: None,
        dynamic_source: None,
        line_number: 1,
    }
}

/// A.py imports B and holds class X; B.py holds class Y(X); foo is a
/// complex function calling bar.
fn fixture_store(dir: &tempfile::TempDir) -> GraphStore {
    let mut module_a = ModuleAst::new("A.py", Lang::Python);
    module_a.total_lines = 10;
    module_a.imports.push(import("B"));
    module_a.classes.push(ClassDef {
        name: "X".to_string(),
        bases: Vec::new(),
        decorators: Vec::new(),
        docstring: None,
        methods: Vec::new(),
        attributes: Vec::new(),
        attribute_types: Vec::new(),
        start_line: 2,
        end_line: 4,
    });
    let mut foo = FunctionDef::named("foo");
    foo.body_complexity = 5;
    foo.decorators.push("cache".to_string());
    foo.call_sites.push(CallSiteDef {
        callee: "bar".to_string(),
        line: 6,
        is_method_call: false,
        receiver: None,
    });
    let mut bar = FunctionDef::named("bar");
    bar.body_complexity = 1;
    module_a.functions.push(foo);
    module_a.functions.push(bar);

    let mut module_b = ModuleAst::new("B.py", Lang::Python);
    module_b.total_lines = 5;
    module_b.classes.push(ClassDef {
        name: "Y".to_string(),
        bases: vec!["X".to_string()],
        decorators: Vec::new(),
        docstring: None,
        methods: Vec::new(),
        attributes: Vec::new(),
        attribute_types: Vec::new(),
        start_line: 1,
        end_line: 3,
    });

    let mut store = GraphStore::open(dir.path().join("mubase")).unwrap();
    store.build(&[module_a, module_b], dir.path()).unwrap();
    store
}

fn run(store: &GraphStore, muql: &str) -> QueryResult {
    let engine = MuqlEngine::new(store);
    let result = engine.query(muql);
    assert!(result.error.is_none(), "query failed: {:?}", result.error);
    result
}

fn run_err(store: &GraphStore, muql: &str) -> QueryError {
    MuqlEngine::new(store).execute(muql).unwrap_err()
}

#[test]
fn test_select_with_complexity_filter() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let result = run(&store, "SELECT name FROM functions WHERE complexity > 1");
    assert_eq!(result.columns, vec!["name".to_string()]);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], serde_json::json!("foo"));
}

#[test]
fn test_select_star_from_view() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let result = run(&store, "SELECT * FROM classes");
    assert_eq!(result.row_count, 2);
    assert_eq!(result.columns.len(), 9);
}

#[test]
fn test_select_aggregates() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let count = run(&store, "SELECT COUNT(*) FROM functions");
    assert_eq!(count.rows[0][0], serde_json::json!(2));

    let avg = run(&store, "SELECT AVG(complexity) FROM functions");
    assert_eq!(avg.rows[0][0], serde_json::json!(3.0));

    let sum = run(&store, "SELECT SUM(complexity) FROM functions");
    assert_eq!(sum.rows[0][0], serde_json::json!(6));
}

#[test]
fn test_select_like_and_in() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let like = run(&store, "SELECT name FROM nodes WHERE name LIKE 'f%'");
    assert_eq!(like.rows.len(), 1);

    let within = run(
        &store,
        "SELECT name FROM nodes WHERE name IN ('foo', 'bar') ORDER BY name",
    );
    assert_eq!(within.rows.len(), 2);
    assert_eq!(within.rows[0][0], serde_json::json!("bar"));

    let without = run(
        &store,
        "SELECT name FROM functions WHERE name NOT IN ('foo')",
    );
    assert_eq!(without.rows.len(), 1);
    assert_eq!(without.rows[0][0], serde_json::json!("bar"));
}

#[test]
fn test_select_and_or_conditions() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let result = run(
        &store,
        "SELECT name FROM nodes WHERE type = 'function' AND complexity >= 5 OR name = 'X'",
    );
    let names: Vec<_> = result.rows.iter().map(|r| r[0].clone()).collect();
    assert!(names.contains(&serde_json::json!("foo")));
    assert!(names.contains(&serde_json::json!("X")));
}

#[test]
fn test_select_order_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let result = run(
        &store,
        "SELECT name, complexity FROM functions ORDER BY complexity DESC LIMIT 1",
    );
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], serde_json::json!("foo"));
}

#[test]
fn test_unknown_table_and_column() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    assert!(matches!(
        run_err(&store, "SELECT * FROM widgets"),
        QueryError::UnknownTable(name) if name == "widgets"
    ));
    assert!(matches!(
        run_err(&store, "SELECT bogus FROM nodes"),
        QueryError::UnknownColumn(name) if name == "bogus"
    ));
    assert!(matches!(
        run_err(&store, "SELECT name FROM nodes WHERE bogus = 1"),
        QueryError::UnknownColumn(_)
    ));
}

#[test]
fn test_syntax_error_carries_offset() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    match run_err(&store, "SELECT FROM nodes") {
        QueryError::Syntax { offset, .. } => assert_eq!(offset, 7),
        other => panic!("expected syntax error, got {other:?}"),
    }
    assert!(matches!(
        run_err(&store, "FROBNICATE"),
        QueryError::Syntax { .. }
    ));
}

#[test]
fn test_show_dependencies_depth_two() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let result = run(&store, "SHOW dependencies OF mod:A.py DEPTH 2");
    let ids: Vec<_> = result.rows.iter().map(|r| r[0].clone()).collect();
    assert!(ids.contains(&serde_json::json!("mod:B.py")));
    assert!(ids.contains(&serde_json::json!("cls:A.py:X")));
}

#[test]
fn test_show_dependents_and_children() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let dependents = run(&store, "SHOW dependents OF mod:B.py");
    let ids: Vec<_> = dependents.rows.iter().map(|r| r[0].clone()).collect();
    assert!(ids.contains(&serde_json::json!("mod:A.py")));

    let children = run(&store, "SHOW children OF mod:A.py");
    assert_eq!(children.row_count, 3); // X, foo, bar
}

#[test]
fn test_show_callers_and_callees() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let callers = run(&store, "SHOW callers OF bar");
    let ids: Vec<_> = callers.rows.iter().map(|r| r[0].clone()).collect();
    assert!(ids.contains(&serde_json::json!("fn:A.py:foo")));

    let callees = run(&store, "SHOW callees OF foo");
    let ids: Vec<_> = callees.rows.iter().map(|r| r[0].clone()).collect();
    assert!(ids.contains(&serde_json::json!("fn:A.py:bar")));
}

#[test]
fn test_show_impact_via_edge_filter() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let impact = run(&store, "SHOW impact OF mod:A.py VIA IMPORTS");
    let ids: Vec<_> = impact.rows.iter().map(|r| r[0].clone()).collect();
    assert!(ids.contains(&serde_json::json!("mod:B.py")));
    assert!(!ids.contains(&serde_json::json!("cls:A.py:X")));
}

#[test]
fn test_show_ancestors() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let ancestors = run(&store, "SHOW ancestors OF cls:A.py:X");
    let ids: Vec<_> = ancestors.rows.iter().map(|r| r[0].clone()).collect();
    // Contained by A, inherited by Y.
    assert!(ids.contains(&serde_json::json!("mod:A.py")));
    assert!(ids.contains(&serde_json::json!("cls:B.py:Y")));
}

#[test]
fn test_node_ref_resolution_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    // Bare name resolves to the exact name match.
    let by_name = run(&store, "SHOW callees OF foo");
    assert!(by_name.row_count >= 1);

    // Unknown refs fail typed.
    assert!(matches!(
        run_err(&store, "SHOW dependencies OF nothing_here"),
        QueryError::UnresolvedNode(_)
    ));
    assert!(matches!(
        run_err(&store, "SHOW dependencies OF mod:missing.py"),
        QueryError::UnresolvedNode(_)
    ));
}

#[test]
fn test_find_matching_glob() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let result = run(&store, "FIND functions MATCHING 'f*'");
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][2], serde_json::json!("foo"));

    let like = run(&store, "FIND functions MATCHING 'ba%'");
    assert_eq!(like.rows.len(), 1);
    assert_eq!(like.rows[0][2], serde_json::json!("bar"));
}

#[test]
fn test_find_calling() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let functions = run(&store, "FIND functions CALLING bar");
    assert_eq!(functions.rows.len(), 1);
    assert_eq!(functions.rows[0][0], serde_json::json!("fn:A.py:foo"));

    // Project the callers onto their containing module.
    let modules = run(&store, "FIND modules CALLING bar");
    assert_eq!(modules.rows.len(), 1);
    assert_eq!(modules.rows[0][0], serde_json::json!("mod:A.py"));
}

#[test]
fn test_find_with_decorator() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let result = run(&store, "FIND functions WITH DECORATOR '@cache'");
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][2], serde_json::json!("foo"));

    let none = run(&store, "FIND functions WITH DECORATOR '@missing'");
    assert_eq!(none.row_count, 0);
}

#[test]
fn test_find_importing() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let result = run(&store, "FIND modules IMPORTING mod:B.py");
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], serde_json::json!("mod:A.py"));
}

#[test]
fn test_find_cycles_empty_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let cycles = run(&store, "FIND CYCLES");
    assert_eq!(cycles.row_count, 0);

    let filtered = run(&store, "FIND CYCLES WHERE edge_type = 'imports'");
    assert_eq!(filtered.row_count, 0);
}

#[test]
fn test_path_query() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let path = run(&store, "PATH FROM mod:A.py TO fn:A.py:bar");
    assert!(path.row_count >= 2);
    assert_eq!(path.rows[0][1], serde_json::json!("mod:A.py"));
    assert_eq!(
        path.rows.last().unwrap()[1],
        serde_json::json!("fn:A.py:bar")
    );

    // Unreachable under a depth cap of zero hops is empty, not error.
    let capped = run(&store, "PATH FROM mod:B.py TO mod:A.py MAX DEPTH 3");
    assert_eq!(capped.row_count, 0);
}

#[test]
fn test_path_via_edge_type() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let path = run(&store, "PATH FROM mod:A.py TO mod:B.py VIA imports");
    assert_eq!(path.row_count, 2);
}

#[test]
fn test_analyze_complexity() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let result = run(&store, "ANALYZE complexity");
    // top functions plus the trailing average row
    assert!(result.row_count >= 3);
    assert_eq!(result.rows[0][0], serde_json::json!("foo"));
    let last = result.rows.last().unwrap();
    assert_eq!(last[0], serde_json::json!("(average)"));
}

#[test]
fn test_analyze_hotspots_and_impact() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let hotspots = run(&store, "ANALYZE hotspots");
    assert_eq!(hotspots.rows[0][0], serde_json::json!("A.py"));

    let impact = run(&store, "ANALYZE impact FOR mod:A.py");
    assert!(impact.row_count >= 1);

    let circular = run(&store, "ANALYZE circular");
    assert_eq!(circular.row_count, 0);
}

#[test]
fn test_describe() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let tables = run(&store, "DESCRIBE tables");
    assert_eq!(tables.row_count, 5);

    let functions = run(&store, "DESCRIBE functions");
    assert!(
        functions
            .rows
            .iter()
            .any(|r| r[0] == serde_json::json!("complexity"))
    );

    assert!(matches!(
        run_err(&store, "DESCRIBE widgets"),
        QueryError::UnknownTable(_)
    ));
}

#[test]
fn test_default_limit_applied() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let engine = MuqlEngine::new(&store);
    let explained = engine.explain("SELECT * FROM nodes").unwrap();
    assert!(explained.contains("nodes"));

    // All rows fit well under the default cap here; just assert the
    // query runs without an explicit LIMIT.
    let result = run(&store, "SELECT * FROM nodes");
    assert!(result.row_count <= crate::DEFAULT_LIMIT as usize);
}

#[test]
fn test_query_envelope_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let engine = MuqlEngine::new(&store);
    let result = engine.query("SELECT * FROM widgets");
    assert!(result.error.is_some());
    assert_eq!(result.row_count, 0);
    assert!(result.execution_time_ms >= 0.0);
}

#[test]
fn test_timeout_zero_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    let engine = MuqlEngine::new(&store).with_timeout(std::time::Duration::ZERO);
    // The deadline check runs between stages, so any query trips it.
    let err = engine.execute("FIND CYCLES").unwrap_err();
    assert_eq!(err, QueryError::Timeout);
}

#[test]
fn test_sql_injection_escaped() {
    let dir = tempfile::tempdir().unwrap();
    let store = fixture_store(&dir);

    // The quote inside the literal must not break out of the string.
    let result = run(
        &store,
        "SELECT name FROM nodes WHERE name = \"x'; DROP TABLE nodes; --\"",
    );
    assert_eq!(result.row_count, 0);
    // Table still intact.
    assert!(run(&store, "SELECT COUNT(*) FROM nodes").rows[0][0].as_i64().unwrap() > 0);
}
