// src/core/call_graph/ordering.rs - Execution order of a subgraph
//!
//! Kahn's algorithm with a stack of ready nodes: among the candidates with no
//! remaining callers, the most recently freed one comes out first.

use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use super::call_graph::{Edge, NodeId};

/// Result of ordering a subgraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowOrder<T> {
    Ordered(Vec<T>),
    /// The subgraph contains a cycle; there is no execution order
    CyclePresent,
}

impl<T> FlowOrder<T> {
    pub fn is_cycle(&self) -> bool {
        matches!(self, FlowOrder::CyclePresent)
    }

    /// The ordering, empty when a cycle was found
    pub fn into_vec(self) -> Vec<T> {
        match self {
            FlowOrder::Ordered(items) => items,
            FlowOrder::CyclePresent => Vec::new(),
        }
    }
}

/// Adjacency in first-appearance order, shared by both orderings
struct Kahn {
    nodes: Vec<NodeId>,
    successors: HashMap<NodeId, Vec<NodeId>>,
    in_degree: HashMap<NodeId, usize>,
}

impl Kahn {
    fn new(edges: &[Edge]) -> Self {
        let mut nodes = Vec::new();
        let mut seen = HashSet::new();
        let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();

        for edge in edges {
            for node in [edge.from, edge.to] {
                if seen.insert(node) {
                    nodes.push(node);
                }
            }
            successors.entry(edge.from).or_default().push(edge.to);
            *in_degree.entry(edge.to).or_default() += 1;
        }

        Self {
            nodes,
            successors,
            in_degree,
        }
    }

    /// Visit nodes in topological order, calling `visit` with each node and
    /// its outgoing edges (repeats included). Returns the visited and total
    /// node counts.
    fn run(mut self, mut visit: impl FnMut(NodeId, &[NodeId])) -> (usize, usize) {
        let mut stack: Vec<NodeId> = self
            .nodes
            .iter()
            .copied()
            .filter(|node| self.in_degree.get(node).copied().unwrap_or(0) == 0)
            .collect();

        let mut visited = 0;
        while let Some(node) = stack.pop() {
            visited += 1;
            let successors = self.successors.remove(&node).unwrap_or_default();
            visit(node, &successors);
            for next in successors {
                if let Some(degree) = self.in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        stack.push(next);
                    }
                }
            }
        }

        (visited, self.nodes.len())
    }
}

/// Nodes of `edges` in execution order
pub fn order_nodes(edges: &[Edge]) -> FlowOrder<NodeId> {
    let mut order = Vec::new();
    let (visited, total) = Kahn::new(edges).run(|node, _| order.push(node));

    if visited == total {
        FlowOrder::Ordered(order)
    } else {
        FlowOrder::CyclePresent
    }
}

/// Edges in execution order: each node's outgoing edges are emitted when the
/// node is visited. Repeated pairs are tolerated and dropped from the output.
pub fn order_edges(edges: &[Edge]) -> FlowOrder<Edge> {
    let mut order = Vec::new();
    Kahn::new(edges).run(|node, successors| {
        order.extend(successors.iter().map(|&next| Edge::new(node, next)));
    });

    if order.len() == edges.len() {
        FlowOrder::Ordered(dedup_edges(order))
    } else {
        FlowOrder::CyclePresent
    }
}

/// Drop repeated edges, keeping first occurrences in order
pub fn dedup_edges(edges: impl IntoIterator<Item = Edge>) -> Vec<Edge> {
    let mut seen = HashSet::new();
    edges.into_iter().filter(|edge| seen.insert(*edge)).collect()
}
