// src/core/call_graph/mod.rs
//! Cross-file call graph and execution-flow extraction
//!
//! The graph is built once from parsed modules, then queried: cross-file
//! edges, bounded subsets around a seed, topological flow orderings. The tree
//! pruner is the only operation that writes, and it only rewrites sources.

mod call_graph;
mod builder;
mod resolver;
mod cross_boundary;
mod subset;
mod ordering;
mod pruner;
mod flow;

pub use call_graph::{
    CallGraph, CallGraphStats, Edge, Group, GroupId, GroupType, GraphView, Node, NodeId, NodeKind,
    GLOBAL_TOKEN,
};
pub use builder::GraphBuilder;
pub use resolver::{CallResolver, CallerScope, Resolution, StaticResolver, SymbolTable};
pub use cross_boundary::{base_nodes, find_cross_edges};
pub use subset::{extract_subset, SubsetParams};
pub use ordering::{dedup_edges, order_edges, order_nodes, FlowOrder};
pub use pruner::TreePruner;
pub use flow::{flow_line, render_call_tree, DependencyContext, FlowExtractor, SeedFlow};
