//! Graphviz output for call graph views
//!
//! Views are written as DOT with one cluster per file and a nested cluster per
//! class, then optionally rasterized by running the `dot` binary.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::error::{FlowdocError, Result};
use super::call_graph::{CallGraph, GraphView, GroupId, GroupType, NodeId, NodeKind};

const EDGE_COLORS: [&str; 6] = ["#000000", "#E69F00", "#56B4E9", "#009E73", "#0072B2", "#D55E00"];

/// What a render call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// DOT file written and rasterized
    Rendered { graph_file: PathBuf, image_file: PathBuf },
    /// DOT file written, rasterization disabled
    DotOnly { graph_file: PathBuf },
    /// The view has no edges; nothing was written
    Empty,
}

pub struct GraphRenderer {
    dot_binary: String,
    format: String,
    rasterize: bool,
}

impl GraphRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            dot_binary: config.dot_binary.clone(),
            format: config.format.clone(),
            rasterize: config.enabled,
        }
    }

    /// DOT source for a view
    pub fn to_dot(&self, graph: &CallGraph, view: &GraphView) -> String {
        let included: HashSet<NodeId> = view.nodes.iter().copied().collect();
        let callers: HashSet<NodeId> = view.edges.iter().map(|e| e.from).collect();
        let callees: HashSet<NodeId> = view.edges.iter().map(|e| e.to).collect();

        let mut lines = vec![
            "digraph G {".to_string(),
            "    concentrate=true;".to_string(),
            "    splines=\"ortho\";".to_string(),
            "    rankdir=\"LR\";".to_string(),
            "    node [fontname=\"Helvetica\"];".to_string(),
            String::new(),
        ];

        for &node in &view.nodes {
            let n = graph.node(node);
            let fill = if n.kind == NodeKind::Global {
                "#ffd87d"
            } else if callers.contains(&node) && !callees.contains(&node) {
                "#a6e3a1"
            } else if callees.contains(&node) && !callers.contains(&node) {
                "#cba6f7"
            } else {
                "#cccccc"
            };
            lines.push(format!(
                "    node_{} [label=\"{}: {}()\", name=\"{}::{}\", shape=\"rect\", style=\"rounded,filled\", fillcolor=\"{}\"];",
                node.index(),
                n.line_range.0,
                escape_label(&n.token),
                escape_label(graph.file_token(node)),
                escape_label(&graph.qualified_name(node)),
                fill
            ));
        }

        lines.push(String::new());
        for (i, edge) in view.edges.iter().enumerate() {
            lines.push(format!(
                "    node_{} -> node_{} [color=\"{}\", penwidth=\"2\"];",
                edge.from.index(),
                edge.to.index(),
                EDGE_COLORS[i % EDGE_COLORS.len()]
            ));
        }

        let view_groups: HashSet<GroupId> = view.groups.iter().copied().collect();
        for &file in graph.files() {
            if view_groups.contains(&file) {
                lines.push(String::new());
                self.write_cluster(graph, file, &included, &view_groups, 1, &mut lines);
            }
        }

        lines.push("}".to_string());
        lines.join("\n")
    }

    fn write_cluster(
        &self,
        graph: &CallGraph,
        group: GroupId,
        included: &HashSet<NodeId>,
        view_groups: &HashSet<GroupId>,
        depth: usize,
        lines: &mut Vec<String>,
    ) {
        let indent = "    ".repeat(depth);
        let g = graph.group(group);
        let kind = match g.group_type {
            GroupType::File => "File",
            GroupType::Class => "Class",
        };

        lines.push(format!("{}subgraph cluster_{} {{", indent, group.index()));
        let members: Vec<String> = g
            .nodes
            .iter()
            .filter(|&&node| included.contains(&node))
            .map(|node| format!("node_{}", node.index()))
            .collect();
        if !members.is_empty() {
            lines.push(format!("{}    {};", indent, members.join(" ")));
        }
        lines.push(format!("{}    label=\"{}: {}\";", indent, kind, escape_label(&g.token)));
        lines.push(format!("{}    name=\"{}\";", indent, escape_label(&g.token)));
        lines.push(format!("{}    style=\"filled\";", indent));
        lines.push(format!("{}    graph[style=dotted];", indent));

        for &sub in &g.subgroups {
            if view_groups.contains(&sub) {
                self.write_cluster(graph, sub, included, view_groups, depth + 1, lines);
            }
        }
        lines.push(format!("{}}};", indent));
    }

    /// Write the view to `graph_file` and rasterize it next to it as
    /// `<stem>.<format>`.
    ///
    /// When the Graphviz binary is missing, both files are removed and
    /// [`FlowdocError::RenderToolMissing`] is returned.
    pub async fn render(&self, graph: &CallGraph, view: &GraphView, graph_file: &Path) -> Result<RenderOutcome> {
        if view.edges.is_empty() {
            debug!("No edges to render for {}", graph_file.display());
            return Ok(RenderOutcome::Empty);
        }

        if let Some(parent) = graph_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(graph_file, self.to_dot(graph, view)).await?;

        if !self.rasterize {
            info!("Wrote {}", graph_file.display());
            return Ok(RenderOutcome::DotOnly {
                graph_file: graph_file.to_path_buf(),
            });
        }

        let image_file = graph_file.with_extension(&self.format);
        let status = Command::new(&self.dot_binary)
            .arg(format!("-T{}", self.format))
            .arg(graph_file)
            .arg("-o")
            .arg(&image_file)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                info!("Rendered {}", image_file.display());
                Ok(RenderOutcome::Rendered {
                    graph_file: graph_file.to_path_buf(),
                    image_file,
                })
            }
            Ok(status) => Err(FlowdocError::FileSystem(format!(
                "{} failed on {} ({})",
                self.dot_binary,
                graph_file.display(),
                status
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{} is not installed, removing partial graph output", self.dot_binary);
                remove_if_present(graph_file).await?;
                remove_if_present(&image_file).await?;
                Err(FlowdocError::RenderToolMissing {
                    tool: self.dot_binary.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn escape_label(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: usize,
    pub file: String,
    pub name: String,
    pub kind: NodeKind,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: usize,
    pub to: usize,
    pub cross_file: bool,
}

/// Serializable form of a view for external tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub seed: Option<usize>,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphSnapshot {
    pub fn new(graph: &CallGraph, view: &GraphView) -> Self {
        let nodes = view
            .nodes
            .iter()
            .map(|&id| {
                let node = graph.node(id);
                NodeRecord {
                    id: id.index(),
                    file: graph.file_token(id).to_string(),
                    name: graph.qualified_name(id),
                    kind: node.kind,
                    line: node.line_range.0,
                }
            })
            .collect();

        let edges = view
            .edges
            .iter()
            .map(|edge| EdgeRecord {
                from: edge.from.index(),
                to: edge.to.index(),
                cross_file: graph.file_group(edge.from) != graph.file_group(edge.to),
            })
            .collect();

        Self {
            seed: view.seed.map(NodeId::index),
            nodes,
            edges,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
