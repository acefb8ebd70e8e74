//! Unit tests for mu-core

use crate::graph::AlgoGraph;
use crate::model::*;

#[test]
fn test_node_id_scheme() {
    assert_eq!(module_id("src/a.py"), "mod:src/a.py");
    assert_eq!(class_id("src/a.py", "X"), "cls:src/a.py:X");
    assert_eq!(function_id("src/a.py", "run"), "fn:src/a.py:run");
    assert_eq!(method_id("src/a.py", "X", "run"), "fn:src/a.py:X.run");
    assert_eq!(external_id("requests"), "ext:requests");
}

#[test]
fn test_parse_node_id() {
    assert_eq!(parse_node_id("mod:src/a.py"), Some(("mod", "src/a.py", None)));
    assert_eq!(
        parse_node_id("cls:src/a.py:X"),
        Some(("cls", "src/a.py", Some("X")))
    );
    assert_eq!(
        parse_node_id("fn:src/a.py:X.run"),
        Some(("fn", "src/a.py", Some("X.run")))
    );
    assert_eq!(parse_node_id("ext:requests"), Some(("ext", "requests", None)));
    assert_eq!(parse_node_id("bogus:x"), None);
    assert_eq!(parse_node_id("no-colon"), None);
}

#[test]
fn test_edge_id_deterministic() {
    let a = edge_id("mod:a.py", "mod:b.py", EdgeType::Imports);
    let b = edge_id("mod:a.py", "mod:b.py", EdgeType::Imports);
    assert_eq!(a, b);
    assert_eq!(a, "IMPORTS:mod:a.py->mod:b.py");

    let other = edge_id("mod:a.py", "mod:b.py", EdgeType::Contains);
    assert_ne!(a, other);
}

#[test]
fn test_lang_aliases() {
    assert_eq!(Lang::from_tag("py"), Some(Lang::Python));
    assert_eq!(Lang::from_tag("ts"), Some(Lang::TypeScript));
    assert_eq!(Lang::from_tag("rs"), Some(Lang::Rust));
    assert_eq!(Lang::from_tag("golang"), Some(Lang::Go));
    assert_eq!(Lang::from_tag("c#"), Some(Lang::CSharp));
    assert_eq!(Lang::from_tag("PYTHON"), Some(Lang::Python));
    assert_eq!(Lang::from_tag("cobol"), None);
}

#[test]
fn test_lang_from_path() {
    use std::path::Path;
    assert_eq!(Lang::from_path(Path::new("a.py")), Some(Lang::Python));
    assert_eq!(Lang::from_path(Path::new("a.tsx")), Some(Lang::Tsx));
    assert_eq!(Lang::from_path(Path::new("a.cs")), Some(Lang::CSharp));
    assert_eq!(Lang::from_path(Path::new("README.md")), None);
}

#[test]
fn test_edge_type_parse_case_insensitive() {
    assert_eq!(EdgeType::parse("imports"), Some(EdgeType::Imports));
    assert_eq!(EdgeType::parse("IMPORTS"), Some(EdgeType::Imports));
    assert_eq!(EdgeType::parse("Calls"), Some(EdgeType::Calls));
    assert_eq!(EdgeType::parse("unknown"), None);
}

#[test]
fn test_node_properties_roundtrip() {
    let props = NodeProperties::Function {
        decorators: vec!["cache".to_string()],
        parameters: vec![],
        return_type: Some("int".to_string()),
        is_async: true,
        is_method: false,
        is_static: false,
        is_classmethod: false,
        is_property: false,
        docstring: None,
        body_source: None,
        extra: Default::default(),
    };
    let json = props.to_json();
    assert!(json.contains("\"kind\":\"function\""));
    let back: NodeProperties = serde_json::from_str(&json).unwrap();
    assert_eq!(props, back);
}

#[test]
fn test_graph_event_payload_shape() {
    use crate::events::{GraphEvent, GraphEventKind};
    let mut event = GraphEvent::new(
        GraphEventKind::NodeAdded,
        "mod:src/a.py",
        NodeType::Module,
        "src/a.py",
    );
    event.version = 3;
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "node_added");
    assert_eq!(json["node_id"], "mod:src/a.py");
    assert_eq!(json["node_type"], "module");
    assert_eq!(json["version"], 3);
}

fn sample_graph() -> AlgoGraph {
    // a -> b -> c, a -> c, d isolated via incoming from c
    AlgoGraph::from_edges(vec![
        ("a".to_string(), "b".to_string(), EdgeType::Imports),
        ("b".to_string(), "c".to_string(), EdgeType::Imports),
        ("a".to_string(), "c".to_string(), EdgeType::Calls),
        ("c".to_string(), "d".to_string(), EdgeType::Contains),
    ])
}

#[test]
fn test_impact_reachability() {
    let g = sample_graph();
    let impacted = g.impact("a", None);
    assert!(impacted.contains(&"b".to_string()));
    assert!(impacted.contains(&"c".to_string()));
    assert!(impacted.contains(&"d".to_string()));
    // Start node excluded
    assert!(!impacted.contains(&"a".to_string()));
}

#[test]
fn test_impact_edge_filter() {
    let g = sample_graph();
    let impacted = g.impact("a", Some(&[EdgeType::Imports]));
    assert!(impacted.contains(&"b".to_string()));
    assert!(impacted.contains(&"c".to_string()));
    assert!(!impacted.contains(&"d".to_string()));

    let calls_only = g.impact("a", Some(&[EdgeType::Calls]));
    assert_eq!(calls_only, vec!["c".to_string()]);
}

#[test]
fn test_ancestors_is_reverse_impact() {
    let g = sample_graph();
    let up = g.ancestors("c", None);
    assert!(up.contains(&"a".to_string()));
    assert!(up.contains(&"b".to_string()));
    assert!(!up.contains(&"d".to_string()));
}

#[test]
fn test_impact_unknown_node_is_empty() {
    let g = sample_graph();
    assert!(g.impact("nope", None).is_empty());
    assert!(g.ancestors("nope", None).is_empty());
}

#[test]
fn test_find_cycles_scc() {
    let g = AlgoGraph::from_edges(vec![
        ("a".to_string(), "b".to_string(), EdgeType::Imports),
        ("b".to_string(), "a".to_string(), EdgeType::Imports),
        ("c".to_string(), "d".to_string(), EdgeType::Imports),
    ]);
    let cycles = g.find_cycles(None);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), 2);
    assert_eq!(cycles[0][0], "a"); // canonical rotation: smallest first
}

#[test]
fn test_find_cycles_self_loop() {
    let g = AlgoGraph::from_edges(vec![(
        "a".to_string(),
        "a".to_string(),
        EdgeType::Calls,
    )]);
    let cycles = g.find_cycles(None);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0], vec!["a".to_string()]);
}

#[test]
fn test_find_cycles_respects_edge_filter() {
    let g = AlgoGraph::from_edges(vec![
        ("a".to_string(), "b".to_string(), EdgeType::Imports),
        ("b".to_string(), "a".to_string(), EdgeType::Calls),
    ]);
    assert_eq!(g.find_cycles(None).len(), 1);
    assert!(g.find_cycles(Some(&[EdgeType::Imports])).is_empty());
}

#[test]
fn test_shortest_path() {
    let g = sample_graph();
    let path = g.shortest_path("a", "d", 10).unwrap();
    assert_eq!(path.first().unwrap(), "a");
    assert_eq!(path.last().unwrap(), "d");
    // a -> c -> d is shorter than a -> b -> c -> d
    assert_eq!(path.len(), 3);
}

#[test]
fn test_shortest_path_depth_cap() {
    let g = sample_graph();
    assert!(g.shortest_path("a", "d", 1).is_none());
    assert!(g.shortest_path("a", "b", 1).is_some());
}

#[test]
fn test_shortest_path_unreachable() {
    let g = sample_graph();
    assert!(g.shortest_path("d", "a", 10).is_none());
}

#[test]
fn test_workspace_rel_path_forward_slashes() {
    use crate::workspace::to_rel_path;
    use std::path::Path;
    let root = Path::new("/work/project");
    let file = Path::new("/work/project/src/a.py");
    assert_eq!(to_rel_path(root, file), "src/a.py");
}

#[test]
fn test_find_workspace_root() {
    use crate::workspace::{MU_DIR, find_workspace_root, mubase_path};
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("proj");
    let nested = root.join("src").join("pkg");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::create_dir_all(root.join(MU_DIR)).unwrap();

    let found = find_workspace_root(&nested).unwrap();
    assert_eq!(found, root);
    assert!(mubase_path(&found).ends_with(".mu/mubase"));

    let outside = tempfile::tempdir().unwrap();
    assert_eq!(find_workspace_root(outside.path()), None);
}

#[test]
fn test_module_ast_qualified_name() {
    use crate::ast::ModuleAst;
    let m = ModuleAst::new("src/kernel/mubase.py", Lang::Python);
    assert_eq!(m.name, "mubase");
    assert_eq!(m.qualified_name(), "src.kernel.mubase");
    assert_eq!(m.package(), "src.kernel");

    let top = ModuleAst::new("main.go", Lang::Go);
    assert_eq!(top.qualified_name(), "main");
    assert_eq!(top.package(), "");
}
