//! End-to-end tests for graph building, flow ordering and pruning.
//!
//! Sources are written to temporary project trees and go through the same
//! parser, builder and extractor the CLI uses.

use std::collections::HashSet;
use std::path::PathBuf;

use assert_fs::prelude::*;
use assert_fs::TempDir;

use flowdoc::config::Config;
use flowdoc::core::call_graph::{
    extract_subset, find_cross_edges, order_edges, order_nodes, CallGraph, FlowOrder, NodeId,
    SubsetParams, TreePruner,
};
use flowdoc::core::Engine;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("should create temp dir");
    for (name, content) in files {
        let child = dir.child(name);
        if let Some(parent) = child.path().parent() {
            std::fs::create_dir_all(parent).expect("should create package dir");
        }
        child.write_str(content).expect("should write source");
    }
    dir
}

fn engine(dir: &TempDir) -> Engine {
    let mut config = Config::default();
    config.project.base_dir = dir.path().to_path_buf();
    Engine::from_config(config).expect("should create engine")
}

fn graph_of(dir: &TempDir, files: &[&str]) -> CallGraph {
    let paths: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
    let (graph, skipped) = engine(dir).build_graph(&paths).expect("should build graph");
    assert!(skipped.is_empty(), "unexpected parse failures: {:?}", skipped);
    graph
}

fn node(graph: &CallGraph, name: &str) -> NodeId {
    let found = graph.find_nodes(name);
    assert_eq!(found.len(), 1, "{} should name one node", name);
    found[0]
}

fn params(upstream_depth: usize, downstream_depth: usize) -> SubsetParams {
    SubsetParams {
        upstream_depth,
        downstream_depth,
    }
}

#[test]
fn two_file_scenario() {
    let dir = project(&[
        ("a.py", "import b\n\ndef f():\n    b.g()\n"),
        ("b.py", "def g():\n    pass\n"),
    ]);
    let mut graph = graph_of(&dir, &["a.py", "b.py"]);
    let (f, g) = (node(&graph, "f"), node(&graph, "g"));

    let cross = find_cross_edges(&graph, graph.edges());
    assert_eq!(cross.len(), 1);
    assert_eq!((cross[0].from, cross[0].to), (f, g));

    let view = extract_subset(&graph, f, params(1, 1), graph.edges());
    assert_eq!(view.nodes, vec![f, g]);
    assert_eq!(view.edges, cross);

    let flow: Vec<String> = order_edges(&view.edges)
        .into_vec()
        .into_iter()
        .map(|edge| format!("{} -> {}", graph.display_name(edge.from), graph.display_name(edge.to)))
        .collect();
    assert_eq!(flow, vec!["a.py f() -> b.py g()"]);

    let keep: HashSet<NodeId> = [f].into_iter().collect();
    TreePruner::default().trim(&mut graph, &keep);
    let base = graph.file_by_token("a").expect("a should be in the graph");
    assert_eq!(graph.module_of(base).unparse(), "import b\n\ndef f():\n    b.g()\n");
}

#[test]
fn every_edge_endpoint_is_a_graph_node() {
    let dir = project(&[
        ("a.py", "import b\nfrom c import C\n\ndef f():\n    b.g()\n    C().run()\n    C.run()\n"),
        ("b.py", "def g():\n    h()\n\ndef h():\n    pass\n"),
        ("c.py", "class C:\n    def __init__(self):\n        self.run()\n\n    def run(self):\n        pass\n"),
    ]);
    let graph = graph_of(&dir, &["a.py", "b.py", "c.py"]);

    let nodes: HashSet<NodeId> = graph.nodes().map(|(id, _)| id).collect();
    for edge in graph.edges() {
        assert!(nodes.contains(&edge.from));
        assert!(nodes.contains(&edge.to));
    }

    let pairs: HashSet<(NodeId, NodeId)> = graph.edges().iter().map(|e| (e.from, e.to)).collect();
    assert_eq!(pairs.len(), graph.edges().len());
}

#[test]
fn cross_edges_always_join_different_files() {
    let dir = project(&[
        ("a.py", "import b\n\ndef f():\n    b.g()\n    local()\n\ndef local():\n    b.g()\n"),
        ("b.py", "def g():\n    helper()\n\ndef helper():\n    pass\n"),
    ]);
    let graph = graph_of(&dir, &["a.py", "b.py"]);

    let cross = find_cross_edges(&graph, graph.edges());
    assert_eq!(cross.len(), 2);
    for edge in &cross {
        assert_ne!(graph.file_token(edge.from), graph.file_token(edge.to));
    }

    let expected: Vec<_> = graph
        .edges()
        .iter()
        .copied()
        .filter(|edge| graph.file_token(edge.from) != graph.file_token(edge.to))
        .collect();
    assert_eq!(cross, expected);
    assert_eq!(
        cross.iter().map(|e| graph.display_name(e.from)).collect::<Vec<_>>(),
        vec!["a.py f()", "a.py local()"]
    );
}

#[test]
fn recursive_base_functions_have_no_flow() {
    let dir = project(&[
        ("a.py", "import b\n\ndef f(n):\n    if n:\n        f(n - 1)\n    b.g()\n"),
        ("b.py", "def g():\n    pass\n"),
    ]);
    let graph = graph_of(&dir, &["a.py", "b.py"]);
    let f = node(&graph, "f");
    assert!(graph.edges().iter().any(|edge| edge.from == f && edge.to == f));

    let context = engine(&dir)
        .dependency_context(&PathBuf::from("a.py"), &[], SubsetParams::default())
        .expect("should extract context");

    assert!(context.flows[0].cycle);
    assert_eq!(context.execution_flow, "");
    assert!(context.base_code.contains("def f(n):"));
}

#[test]
fn orderings_respect_every_edge() {
    let dir = project(&[(
        "m.py",
        "def main():\n    load()\n    save()\n\ndef load():\n    parse()\n\ndef parse():\n    pass\n\ndef save():\n    parse()\n",
    )]);
    let graph = graph_of(&dir, &["m.py"]);
    let view = extract_subset(&graph, node(&graph, "main"), params(0, 5), graph.edges());

    let order = match order_nodes(&view.edges) {
        FlowOrder::Ordered(order) => order,
        FlowOrder::CyclePresent => panic!("graph is acyclic"),
    };
    assert_eq!(order.len(), 4);
    for edge in &view.edges {
        let from = order.iter().position(|&n| n == edge.from);
        let to = order.iter().position(|&n| n == edge.to);
        assert!(from < to, "caller must precede callee");
    }

    let edges = order_edges(&view.edges).into_vec();
    assert_eq!(edges.len(), view.edges.len());
    let unique: HashSet<_> = edges.iter().collect();
    assert_eq!(unique.len(), edges.len());
}

#[test]
fn cycles_yield_no_flow() {
    let dir = project(&[
        ("a.py", "import b\n\ndef ping():\n    b.pong()\n"),
        ("b.py", "import a\n\ndef pong():\n    a.ping()\n"),
    ]);
    let graph = graph_of(&dir, &["a.py", "b.py"]);
    let view = extract_subset(&graph, node(&graph, "ping"), params(2, 2), graph.edges());

    assert_eq!(order_nodes(&view.edges), FlowOrder::CyclePresent);
    assert!(order_edges(&view.edges).into_vec().is_empty());
}

#[test]
fn one_directional_subsets_stay_on_their_side() {
    let dir = project(&[(
        "m.py",
        "def caller():\n    mid()\n\ndef mid():\n    callee()\n\ndef callee():\n    pass\n",
    )]);
    let graph = graph_of(&dir, &["m.py"]);
    let (caller, mid, callee) = (node(&graph, "caller"), node(&graph, "mid"), node(&graph, "callee"));

    let down = extract_subset(&graph, mid, params(0, 3), graph.edges());
    assert_eq!(down.nodes, vec![mid, callee]);

    let up = extract_subset(&graph, mid, params(3, 0), graph.edges());
    assert_eq!(up.nodes, vec![caller, mid]);

    let none = extract_subset(&graph, mid, params(0, 0), graph.edges());
    assert_eq!(none.nodes, vec![mid]);
    assert!(none.edges.is_empty());
}

#[test]
fn pruning_with_every_definition_kept_changes_nothing() {
    let source = "def f():\n    g()\n\ndef g():\n    pass\n\nclass A:\n    def m(self):\n        pass\n";
    let dir = project(&[("a.py", source)]);
    let mut graph = graph_of(&dir, &["a.py"]);
    let before = graph.modules()[0].unparse();

    let keep: HashSet<NodeId> = graph.nodes().map(|(id, _)| id).collect();
    TreePruner::new(false, false).trim(&mut graph, &keep);

    assert_eq!(graph.modules()[0].unparse(), before);
}

#[test]
fn pruning_a_clone_leaves_the_original_intact() {
    let dir = project(&[("a.py", "def f():\n    pass\n\ndef g():\n    pass\n")]);
    let graph = graph_of(&dir, &["a.py"]);
    let mut pruned = graph.clone();

    let keep: HashSet<NodeId> = [node(&graph, "f")].into_iter().collect();
    TreePruner::default().trim(&mut pruned, &keep);

    assert!(graph.modules()[0].unparse().contains("def g():"));
    assert!(!pruned.modules()[0].unparse().contains("def g():"));
}

#[test]
fn dependency_context_for_a_package_layout() {
    let dir = project(&[
        ("app.py", "from services import store\n\ndef main():\n    store.save()\n"),
        ("services/store.py", "from services.db import connect\n\ndef save():\n    connect()\n\ndef load():\n    pass\n"),
        ("services/db.py", "def connect():\n    pass\n"),
    ]);

    let context = engine(&dir)
        .dependency_context(
            &PathBuf::from("app.py"),
            &[PathBuf::from("services/store.py"), PathBuf::from("services/db.py")],
            SubsetParams::default(),
        )
        .expect("should extract context");

    assert_eq!(
        context.execution_flow,
        "app.py main() -> services/store.py save()\nservices/store.py save() -> services/db.py connect()\n"
    );
    assert!(context.deps_code.contains("FILE services/store.py:"));
    assert!(context.deps_code.contains("FILE services/db.py:"));
    assert!(!context.deps_code.contains("def load"));
}

#[test]
fn unparseable_dependencies_are_skipped() {
    let dir = project(&[
        ("a.py", "import b\nimport c\n\ndef f():\n    b.g()\n    c.h()\n"),
        ("b.py", "def g():\n    pass\n"),
        ("c.py", "def h(:\n"),
    ]);

    let context = engine(&dir)
        .dependency_context(&PathBuf::from("a.py"), &[], SubsetParams::default())
        .expect("should extract context despite c.py");

    assert_eq!(context.execution_flow, "a.py f() -> b.py g()\n");
    let skipped: Vec<&PathBuf> = context.skipped.iter().map(|failure| &failure.path).collect();
    assert_eq!(skipped, vec![&PathBuf::from("c.py")]);
    assert!(!context.skipped[0].message.is_empty());

    let json = serde_json::to_value(&context).expect("context should serialize");
    assert_eq!(json["skipped"][0]["path"], "c.py");
}
