// src/core/call_graph/flow.rs - Dependency context for a base file
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::super::parser::ParseFailure;
use super::call_graph::{CallGraph, Edge, GroupId, NodeId};
use super::cross_boundary::{base_nodes, find_cross_edges};
use super::ordering::{dedup_edges, order_edges, order_nodes};
use super::pruner::TreePruner;
use super::subset::{extract_subset, SubsetParams};

/// Ordered flow around one seed of the base file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFlow {
    pub seed: String,
    pub nodes: Vec<String>,
    /// `caller -> callee` lines in execution order
    pub edges: Vec<String>,
    /// The seed's subgraph is cyclic and has no execution order
    pub cycle: bool,
}

/// Everything needed to describe a base file in the context of the files it
/// talks to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyContext {
    pub base: PathBuf,
    pub seeds: Vec<String>,
    pub flows: Vec<SeedFlow>,
    pub execution_flow: String,
    pub call_tree: String,
    /// Pruned source of the base file
    pub base_code: String,
    /// Pruned sources of the other files, one `FILE <name>.py:` block each
    pub deps_code: String,
    /// Input files left out of the graph because they did not parse
    #[serde(default)]
    pub skipped: Vec<ParseFailure>,
}

/// Result of the read-only part of an extraction
struct FlowPlan {
    seeds: Vec<String>,
    flows: Vec<SeedFlow>,
    edges: Vec<Edge>,
    keep: HashSet<NodeId>,
}

pub struct FlowExtractor {
    params: SubsetParams,
    pruner: TreePruner,
}

impl FlowExtractor {
    pub fn new(params: SubsetParams, pruner: TreePruner) -> Self {
        Self { params, pruner }
    }

    /// Extract flows for every base-file node on a cross-file edge, then prune
    /// all files down to the definitions those flows touch.
    pub fn extract(&self, graph: &mut CallGraph, base_file: GroupId) -> DependencyContext {
        let plan = self.plan(graph, base_file);

        let execution_flow: String = plan
            .edges
            .iter()
            .map(|edge| format!("{}\n", flow_line(graph, *edge)))
            .collect();
        let call_tree = render_call_tree(graph, &plan.edges);

        // Every query is done; the graph's sources can be rewritten now
        self.pruner.trim(graph, &plan.keep);

        let base_code = graph.module_of(base_file).unparse();
        let mut deps_code = String::new();
        for &file in graph.files() {
            if file == base_file {
                continue;
            }
            let module = graph.module_of(file);
            if module.functions().next().is_none() && module.classes().next().is_none() {
                continue;
            }
            deps_code.push_str(&format!("\n\nFILE {}.py:\n\n{}", module.token, module.unparse()));
        }

        DependencyContext {
            base: graph.module_of(base_file).path.clone(),
            seeds: plan.seeds,
            flows: plan.flows,
            execution_flow,
            call_tree,
            base_code,
            deps_code,
            skipped: Vec::new(),
        }
    }

    fn plan(&self, graph: &CallGraph, base_file: GroupId) -> FlowPlan {
        let cross = find_cross_edges(graph, graph.edges());
        let seeds = base_nodes(graph, &cross, base_file);
        if seeds.is_empty() {
            info!("{} has no cross-file calls", graph.group(base_file).token);
        }

        let mut keep = HashSet::new();
        let mut flows = Vec::new();
        let mut ordered = Vec::new();

        for &seed in &seeds {
            let view = extract_subset(graph, seed, self.params, graph.edges());
            keep.extend(view.nodes.iter().copied());

            let nodes = order_nodes(&view.edges);
            let edges = order_edges(&view.edges);
            let cycle = nodes.is_cycle() || edges.is_cycle();
            if cycle {
                warn!("cycle in the flow of {}, no execution order", graph.display_name(seed));
            }

            let edges = edges.into_vec();
            debug!("{}: {} nodes, {} ordered edges", graph.display_name(seed), view.nodes.len(), edges.len());

            flows.push(SeedFlow {
                seed: graph.display_name(seed),
                nodes: nodes.into_vec().into_iter().map(|n| graph.display_name(n)).collect(),
                edges: edges.iter().map(|&edge| flow_line(graph, edge)).collect(),
                cycle,
            });
            ordered.extend(edges);
        }

        FlowPlan {
            seeds: seeds.iter().map(|&seed| graph.display_name(seed)).collect(),
            flows,
            edges: dedup_edges(ordered),
            keep,
        }
    }
}

/// `a.py f() -> b.py g()`
pub fn flow_line(graph: &CallGraph, edge: Edge) -> String {
    format!("{} -> {}", graph.display_name(edge.from), graph.display_name(edge.to))
}

/// Indented call tree of ordered edges, one root per node never called
pub fn render_call_tree(graph: &CallGraph, edges: &[Edge]) -> String {
    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut order = Vec::new();
    let mut called = HashSet::new();

    for edge in edges {
        for node in [edge.from, edge.to] {
            if !order.contains(&node) {
                order.push(node);
            }
        }
        children.entry(edge.from).or_default().push(edge.to);
        called.insert(edge.to);
    }

    let mut out = String::new();
    let mut path = Vec::new();
    for root in order.into_iter().filter(|node| !called.contains(node)) {
        write_tree(graph, &children, root, 0, &mut path, &mut out);
    }
    out
}

fn write_tree(
    graph: &CallGraph,
    children: &HashMap<NodeId, Vec<NodeId>>,
    node: NodeId,
    depth: usize,
    path: &mut Vec<NodeId>,
    out: &mut String,
) {
    let prefix = if depth > 0 { "-> Calls " } else { "" };
    out.push_str(&format!(
        "{}{}{}.py {}()\n",
        "    ".repeat(depth),
        prefix,
        graph.file_token(node),
        graph.qualified_name(node)
    ));

    if path.contains(&node) {
        return;
    }
    path.push(node);
    for &child in children.get(&node).map(Vec::as_slice).unwrap_or_default() {
        write_tree(graph, children, child, depth + 1, path, out);
    }
    path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use crate::core::call_graph::GraphBuilder;
    use crate::core::languages::{LanguageParser, PythonParser};

    fn build(files: &[(&str, &str)]) -> CallGraph {
        let mut parser = PythonParser::new().unwrap();
        let modules = files
            .iter()
            .map(|(path, source)| parser.parse(source, Path::new(path)).unwrap())
            .collect();
        GraphBuilder::new().build(modules)
    }

    fn extractor() -> FlowExtractor {
        FlowExtractor::new(SubsetParams::default(), TreePruner::default())
    }

    #[test]
    fn two_file_flow() {
        let mut graph = build(&[
            ("a.py", "import b\n\ndef f():\n    b.g()\n\ndef unused():\n    pass\n"),
            ("b.py", "def g():\n    pass\n\ndef other():\n    pass\n"),
        ]);
        let base = graph.file_by_token("a").unwrap();

        let context = extractor().extract(&mut graph, base);

        assert_eq!(context.seeds, vec!["a.py f()"]);
        assert_eq!(context.execution_flow, "a.py f() -> b.py g()\n");
        assert_eq!(context.call_tree, "a.py f()\n    -> Calls b.py g()\n");
        assert_eq!(context.base_code, "import b\n\ndef f():\n    b.g()\n");
        assert_eq!(context.deps_code, "\n\nFILE b.py:\n\ndef g():\n    pass\n");
        assert!(!context.flows[0].cycle);
    }

    #[test]
    fn methods_show_their_class_in_the_flow() {
        let mut graph = build(&[
            ("a.py", "from b import Store\n\ndef f():\n    Store.save()\n"),
            ("b.py", "class Store:\n    def save(self):\n        self.write()\n\n    def write(self):\n        pass\n"),
        ]);
        let base = graph.file_by_token("a").unwrap();

        let context = extractor().extract(&mut graph, base);

        assert_eq!(
            context.execution_flow,
            "a.py f() -> b.py Store.save()\nb.py Store.save() -> b.py Store.write()\n"
        );
        assert!(context.deps_code.contains("class Store:"));
        assert!(context.deps_code.contains("def write(self):"));
    }

    #[test]
    fn cyclic_seeds_keep_their_definitions_without_flow() {
        let mut graph = build(&[
            ("a.py", "import b\n\ndef f():\n    b.g()\n"),
            ("b.py", "import a\n\ndef g():\n    a.f()\n"),
        ]);
        let base = graph.file_by_token("a").unwrap();

        let context = extractor().extract(&mut graph, base);

        assert_eq!(context.execution_flow, "");
        assert!(context.flows.iter().all(|flow| flow.cycle));
        assert!(context.base_code.contains("def f():"));
        assert!(context.deps_code.contains("def g():"));
    }

    #[test]
    fn recursive_seeds_have_no_execution_order() {
        let mut graph = build(&[
            ("a.py", "import b\n\ndef f(n):\n    if n:\n        f(n - 1)\n    b.g()\n"),
            ("b.py", "def g():\n    pass\n"),
        ]);
        let base = graph.file_by_token("a").unwrap();

        let context = extractor().extract(&mut graph, base);

        assert_eq!(context.seeds, vec!["a.py f()"]);
        assert!(context.flows[0].cycle);
        assert!(context.flows[0].edges.is_empty());
        assert_eq!(context.execution_flow, "");
        assert_eq!(context.call_tree, "");
        assert!(context.deps_code.contains("def g():"));
    }

    #[test]
    fn base_without_cross_calls_has_empty_context() {
        let mut graph = build(&[
            ("a.py", "def f():\n    pass\n"),
            ("b.py", "def g():\n    pass\n"),
        ]);
        let base = graph.file_by_token("a").unwrap();

        let context = extractor().extract(&mut graph, base);

        assert!(context.seeds.is_empty());
        assert_eq!(context.execution_flow, "");
        assert_eq!(context.deps_code, "");
    }

    #[test]
    fn call_tree_nests_by_depth() {
        let graph = build(&[(
            "m.py",
            "def a():\n    b()\n    c()\n\ndef b():\n    c()\n\ndef c():\n    pass\n",
        )]);
        let edges = graph.edges().to_vec();

        assert_eq!(
            render_call_tree(&graph, &edges),
            "m.py a()\n    -> Calls m.py b()\n        -> Calls m.py c()\n    -> Calls m.py c()\n"
        );
    }
}
