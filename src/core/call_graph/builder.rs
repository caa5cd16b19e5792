// src/core/call_graph/builder.rs - Builds the call graph from parsed modules
use std::collections::HashSet;
use tracing::{debug, info};

use super::super::source::{CallSite, SourceModule, Statement};
use super::call_graph::{CallGraph, Edge, Group, GroupId, GroupType, Node, NodeId, NodeKind, GLOBAL_TOKEN};
use super::resolver::{CallResolver, CallerScope, Resolution, StaticResolver, SymbolTable};

/// Two-pass graph construction: every group and node first, then the edges,
/// so that calls can resolve to definitions in files parsed later.
pub struct GraphBuilder {
    resolver: Box<dyn CallResolver>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            resolver: Box::new(StaticResolver),
        }
    }

    pub fn with_resolver(resolver: Box<dyn CallResolver>) -> Self {
        Self { resolver }
    }

    pub fn build(&self, modules: Vec<SourceModule>) -> CallGraph {
        let mut graph = CallGraph::new();

        for module in modules {
            add_file(&mut graph, module);
        }

        let symbols = SymbolTable::from_graph(&graph);
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        let mut unresolved = 0;

        for (id, node) in graph.nodes() {
            let caller = CallerScope {
                node: id,
                file: graph.file_group(id),
                class: graph.class_of(id),
            };

            for call in &node.calls {
                match self.resolver.resolve(&symbols, &caller, call) {
                    Resolution::Resolved(target) => {
                        let edge = Edge::new(id, target);
                        if seen.insert(edge) {
                            edges.push(edge);
                        }
                    }
                    Resolution::Unresolved => {
                        unresolved += 1;
                        debug!(
                            "unresolved call {} in {}",
                            describe_call(call),
                            graph.display_name(id)
                        );
                    }
                }
            }
        }

        graph.edges = edges;
        graph.unresolved_calls = unresolved;

        info!("Built call graph: {}", graph.get_statistics());
        graph
    }
}

fn describe_call(call: &CallSite) -> String {
    match &call.owner {
        Some(owner) => format!("{}.{}() at line {}", owner, call.name, call.line),
        None => format!("{}() at line {}", call.name, call.line),
    }
}

fn add_file(graph: &mut CallGraph, module: SourceModule) {
    let module_index = graph.modules.len();
    let file = graph.add_group(Group {
        group_type: GroupType::File,
        token: module.token.clone(),
        parent: None,
        subgroups: Vec::new(),
        nodes: Vec::new(),
        line: 0,
        module: module_index,
    });

    let last_line = module
        .body
        .iter()
        .map(|statement| match statement {
            Statement::Import(s) | Statement::Other(s) => s.line_range.1,
            Statement::Function(f) => f.line_range.1,
            Statement::Class(c) => c.line_range.1,
        })
        .max()
        .unwrap_or(1);

    graph.add_node(Node {
        token: GLOBAL_TOKEN.to_string(),
        kind: NodeKind::Global,
        parent: file,
        line_range: (1, last_line),
        calls: module.global_calls(),
    });

    for statement in &module.body {
        match statement {
            Statement::Function(function) => {
                add_or_merge(graph, file, &function.name, NodeKind::Function, function.line_range, &function.calls);
            }
            Statement::Class(class) => {
                let existing = graph
                    .group(file)
                    .subgroups
                    .iter()
                    .copied()
                    .find(|&group| graph.group(group).token == class.name);

                let class_group = match existing {
                    Some(group) => {
                        debug!("merging redefinition of class {} in {}", class.name, module.token);
                        group
                    }
                    None => graph.add_group(Group {
                        group_type: GroupType::Class,
                        token: class.name.clone(),
                        parent: Some(file),
                        subgroups: Vec::new(),
                        nodes: Vec::new(),
                        line: class.line_range.0,
                        module: module_index,
                    }),
                };

                for method in class.methods() {
                    add_or_merge(graph, class_group, &method.name, NodeKind::Method, method.line_range, &method.calls);
                }
            }
            Statement::Import(_) | Statement::Other(_) => {}
        }
    }

    graph.modules.push(module);
}

/// Add a node, or fold a same-scope redefinition into the first one
fn add_or_merge(
    graph: &mut CallGraph,
    parent: GroupId,
    token: &str,
    kind: NodeKind,
    line_range: (usize, usize),
    calls: &[CallSite],
) -> NodeId {
    let existing = graph
        .group(parent)
        .nodes
        .iter()
        .copied()
        .find(|&id| graph.node(id).token == token);

    if let Some(id) = existing {
        debug!("merging redefinition of {} in {}", token, graph.group(parent).token);
        graph.nodes[id.index()].calls.extend(calls.iter().cloned());
        return id;
    }

    graph.add_node(Node {
        token: token.to_string(),
        kind,
        parent,
        line_range,
        calls: calls.to_vec(),
    })
}
