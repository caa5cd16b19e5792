// src/core/call_graph/subset.rs - Bounded neighbourhood of a seed node
use std::collections::{BTreeSet, HashMap, HashSet};
use serde::{Deserialize, Serialize};

use super::call_graph::{CallGraph, Edge, GraphView, NodeId};

/// How far to walk from the seed in each direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetParams {
    /// Hops against edge direction (callers)
    pub upstream_depth: usize,
    /// Hops along edge direction (callees)
    pub downstream_depth: usize,
}

impl Default for SubsetParams {
    fn default() -> Self {
        Self {
            upstream_depth: 2,
            downstream_depth: 2,
        }
    }
}

/// Nodes within `downstream_depth` calls of the seed and within
/// `upstream_depth` callers of it, with the edges among them.
///
/// The two walks are independent: a node reached downstream is not expanded
/// upstream and vice versa.
pub fn extract_subset(graph: &CallGraph, seed: NodeId, params: SubsetParams, edges: &[Edge]) -> GraphView {
    let mut callees: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut callers: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for edge in edges {
        callees.entry(edge.from).or_default().push(edge.to);
        callers.entry(edge.to).or_default().push(edge.from);
    }

    let mut included: BTreeSet<NodeId> = BTreeSet::new();
    included.insert(seed);
    included.extend(walk(seed, &callees, params.downstream_depth));
    included.extend(walk(seed, &callers, params.upstream_depth));

    let edges = edges
        .iter()
        .copied()
        .filter(|edge| included.contains(&edge.from) && included.contains(&edge.to))
        .collect();

    let mut groups = BTreeSet::new();
    for &node in &included {
        groups.insert(graph.node(node).parent);
        groups.insert(graph.file_group(node));
    }

    GraphView {
        seed: Some(seed),
        groups: groups.into_iter().collect(),
        nodes: included.into_iter().collect(),
        edges,
    }
}

/// Breadth-first walk, level by level, for at most `depth` levels
fn walk(seed: NodeId, adjacency: &HashMap<NodeId, Vec<NodeId>>, depth: usize) -> HashSet<NodeId> {
    let mut reached = HashSet::new();
    let mut frontier = vec![seed];

    for _ in 0..depth {
        let mut next = Vec::new();
        for node in frontier {
            for &neighbour in adjacency.get(&node).map(Vec::as_slice).unwrap_or_default() {
                if neighbour != seed && reached.insert(neighbour) {
                    next.push(neighbour);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    reached
}
