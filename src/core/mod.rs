// src/core/mod.rs
mod engine;
mod parser;
mod render;

// Source model shared by the parsers and the graph
pub mod source;

// Cross-file call graph and flow extraction
pub mod call_graph;

// Language-specific parsers
pub mod languages;

pub use parser::{CodeParser, ParseFailure, ParseReport};
pub use render::{EdgeRecord, GraphRenderer, GraphSnapshot, NodeRecord, RenderOutcome};
pub use source::{SourceModule, StructureOptions};

pub use call_graph::{
    CallGraph, DependencyContext, FlowExtractor, FlowOrder, GraphBuilder, GraphView, SubsetParams,
    TreePruner,
};

// Export the main engine
pub use engine::Engine;
