// src/core/call_graph/cross_boundary.rs - Edges that leave their file
use std::collections::HashSet;

use super::call_graph::{CallGraph, Edge, GroupId, NodeId};

/// Edges whose endpoints live in different files, in input order.
/// A node's file is found by walking its parent links up to the file group.
pub fn find_cross_edges(graph: &CallGraph, edges: &[Edge]) -> Vec<Edge> {
    edges
        .iter()
        .copied()
        .filter(|edge| graph.file_group(edge.from) != graph.file_group(edge.to))
        .collect()
}

/// Nodes of `base_file` touched by any of `cross_edges`, on either side,
/// in order of first appearance
pub fn base_nodes(graph: &CallGraph, cross_edges: &[Edge], base_file: GroupId) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    cross_edges
        .iter()
        .flat_map(|edge| [edge.from, edge.to])
        .filter(|&node| graph.file_group(node) == base_file)
        .filter(|&node| seen.insert(node))
        .collect()
}
