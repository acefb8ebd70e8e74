//! Integration tests for MU
//!
//! These tests drive the full pipeline: scan → parse → build → store,
//! then queries and live updates against the same database.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mu_core::{ChangeKind, FileChange, GraphEventKind, ModuleAst};
use mu_parser::parse_source;
use mu_parser::scanner::Scanner;
use mu_query::MuqlEngine;
use mu_store::GraphStore;
use mu_watcher::UpdateWorker;

/// Scan and parse a workspace the way `mu build` does.
fn parse_workspace(root: &Path) -> (Vec<ModuleAst>, HashMap<String, String>) {
    let entries = Scanner::new(root).scan().unwrap();
    let mut modules = Vec::new();
    let mut hashes = HashMap::new();
    for entry in entries {
        let bytes = std::fs::read(root.join(&entry.relative_path)).unwrap();
        let parsed = parse_source(&bytes, &entry.relative_path, entry.language);
        if let Some(module) = parsed.module {
            modules.push(module);
            hashes.insert(entry.relative_path, entry.content_hash);
        }
    }
    (modules, hashes)
}

fn seed_python_workspace(root: &Path) {
    std::fs::write(root.join("A.py"), "import B\n\nclass X:\n    pass\n").unwrap();
    std::fs::write(root.join("B.py"), "from A import X\n\nclass Y(X):\n    pass\n").unwrap();
    std::fs::write(
        root.join("util.py"),
        "def foo(x):\n    if x:\n        for i in range(x):\n            if i and x:\n                pass\n    return x\n\ndef bar():\n    return 1\n",
    )
    .unwrap();
}

#[test]
fn test_end_to_end_build_and_graph_shape() {
    let dir = tempfile::tempdir().unwrap();
    seed_python_workspace(dir.path());

    let (modules, _hashes) = parse_workspace(dir.path());
    let mut store = GraphStore::open(dir.path().join(".mu").join("mubase")).unwrap();
    store.build(&modules, dir.path()).unwrap();

    for id in ["mod:A.py", "mod:B.py", "cls:A.py:X", "cls:B.py:Y"] {
        assert!(store.get_node(id).unwrap().is_some(), "missing {id}");
    }

    let imports = store
        .get_edges(Some("mod:B.py"), None, Some(mu_core::EdgeType::Imports))
        .unwrap();
    assert!(imports.iter().any(|e| e.target_id == "mod:A.py"));

    let inherits = store
        .get_edges(Some("cls:B.py:Y"), None, Some(mu_core::EdgeType::Inherits))
        .unwrap();
    assert_eq!(inherits.len(), 1);
    assert_eq!(inherits[0].target_id, "cls:A.py:X");
}

#[test]
fn test_end_to_end_complexity_query() {
    let dir = tempfile::tempdir().unwrap();
    seed_python_workspace(dir.path());

    let (modules, _hashes) = parse_workspace(dir.path());
    let mut store = GraphStore::open(dir.path().join(".mu").join("mubase")).unwrap();
    store.build(&modules, dir.path()).unwrap();

    let result = MuqlEngine::new(&store).query("SELECT name FROM functions WHERE complexity > 1");
    assert!(result.error.is_none());
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], serde_json::json!("foo"));
}

#[test]
fn test_end_to_end_show_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    seed_python_workspace(dir.path());

    let (modules, _hashes) = parse_workspace(dir.path());
    let mut store = GraphStore::open(dir.path().join(".mu").join("mubase")).unwrap();
    store.build(&modules, dir.path()).unwrap();

    let result = MuqlEngine::new(&store).query("SHOW dependencies OF mod:A.py DEPTH 2");
    assert!(result.error.is_none());
    let ids: Vec<_> = result.rows.iter().map(|r| r[0].clone()).collect();
    assert!(ids.contains(&serde_json::json!("mod:B.py")));
    assert!(ids.contains(&serde_json::json!("cls:A.py:X")));
}

#[test]
fn test_determinism_across_rebuilds() {
    let dir = tempfile::tempdir().unwrap();
    seed_python_workspace(dir.path());

    let (modules, _hashes) = parse_workspace(dir.path());
    let first = mu_store::GraphBuilder::build(&modules);
    let second = mu_store::GraphBuilder::build(&modules);
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.edges, second.edges);

    // Parse order independence is covered by the scanner's sorted
    // output; the same workspace scans identically.
    let (again, _) = parse_workspace(dir.path());
    let third = mu_store::GraphBuilder::build(&again);
    assert_eq!(first.nodes, third.nodes);
}

#[tokio::test]
async fn test_live_update_new_file_visible_in_query() {
    let dir = tempfile::tempdir().unwrap();
    seed_python_workspace(dir.path());

    let (modules, hashes) = parse_workspace(dir.path());
    let mut store = GraphStore::open(dir.path().join(".mu").join("mubase")).unwrap();
    store.build(&modules, dir.path()).unwrap();

    let store = Arc::new(tokio::sync::Mutex::new(store));
    let mut worker = UpdateWorker::new(Arc::clone(&store), dir.path().to_path_buf());
    worker.seed(modules, hashes);
    let mut events = worker.subscribe();
    let mut version = worker.version_watch();

    // A new file importing A appears while the pipeline runs.
    let new_file = dir.path().join("C.py");
    std::fs::write(&new_file, "import A\n\ndef use_x():\n    pass\n").unwrap();
    worker
        .process_change(FileChange {
            path: new_file,
            kind: ChangeKind::Added,
        })
        .await
        .unwrap();

    // Event stream delivers node_added for the module.
    let mut saw_module_added = false;
    while let Ok(event) = events.try_recv() {
        if event.kind == GraphEventKind::NodeAdded && event.node_id == "mod:C.py" {
            assert_eq!(event.file_path, "C.py");
            assert!(event.version >= 1);
            saw_module_added = true;
        }
    }
    assert!(saw_module_added);

    // Post-write visibility via the committed-version watch.
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if *version.borrow() >= 1 {
                break;
            }
            version.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    let store = store.lock().await;
    let edges = store
        .get_edges(Some("mod:C.py"), None, Some(mu_core::EdgeType::Imports))
        .unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target_id, "mod:A.py");

    let result = MuqlEngine::new(&store).query("SELECT name FROM modules ORDER BY name");
    let names: Vec<_> = result.rows.iter().map(|r| r[0].clone()).collect();
    assert!(names.contains(&serde_json::json!("C")));
}

#[test]
fn test_multi_language_workspace() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.py"), "def main():\n    pass\n").unwrap();
    std::fs::write(dir.path().join("svc.ts"), "export function handler(): void {}\n").unwrap();
    std::fs::write(dir.path().join("main.go"), "package main\n\nfunc main() {\n}\n").unwrap();
    std::fs::write(dir.path().join("lib.rs"), "pub fn run() {}\n").unwrap();

    let (modules, _hashes) = parse_workspace(dir.path());
    assert_eq!(modules.len(), 4);

    let mut store = GraphStore::open(dir.path().join(".mu").join("mubase")).unwrap();
    store.build(&modules, dir.path()).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.nodes_by_type.get("module"), Some(&4));
    assert_eq!(stats.nodes_by_type.get("function"), Some(&4));
}

#[test]
fn test_cascade_on_file_removal_leaves_no_dangling_edges() {
    let dir = tempfile::tempdir().unwrap();
    seed_python_workspace(dir.path());

    let (modules, _hashes) = parse_workspace(dir.path());
    let mut store = GraphStore::open(dir.path().join(".mu").join("mubase")).unwrap();
    store.build(&modules, dir.path()).unwrap();

    store.remove_nodes_by_file("A.py").unwrap();

    for edge in store.get_edges(None, None, None).unwrap() {
        for endpoint in [&edge.source_id, &edge.target_id] {
            assert!(
                store.get_node(endpoint).unwrap().is_some(),
                "dangling endpoint {endpoint}"
            );
        }
    }
}
