// src/core/call_graph/call_graph.rs - Arena-backed call graph
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use serde::{Deserialize, Serialize};

use super::super::source::{CallSite, SourceModule};

/// Token of the synthetic node holding a file's top-level code
pub const GLOBAL_TOKEN: &str = "(global)";

/// Stable handle of a group in [`CallGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub(crate) usize);

/// Stable handle of a node in [`CallGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl GroupId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupType {
    File,
    Class,
}

/// Namespace container: a file or a class inside a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub group_type: GroupType,
    /// File token for files, class name for classes
    pub token: String,
    /// Owning file group, `None` for files
    pub parent: Option<GroupId>,
    pub subgroups: Vec<GroupId>,
    pub nodes: Vec<NodeId>,
    pub line: usize,
    /// Index of the owning file's source module
    pub(crate) module: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Function,
    Method,
    /// A file's top-level statements
    Global,
}

/// Callable unit of the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub token: String,
    pub kind: NodeKind,
    pub parent: GroupId,
    pub line_range: (usize, usize),
    pub calls: Vec<CallSite>,
}

/// Directed call reference: `from`'s body contains a call resolved to `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }
}

/// Complete call graph for a set of files.
///
/// Groups, nodes and edges live in flat arenas and refer to each other through
/// [`GroupId`] / [`NodeId`] handles. File groups own their parsed source module,
/// which the pruner rewrites in place.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    pub(crate) groups: Vec<Group>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) files: Vec<GroupId>,
    pub(crate) modules: Vec<SourceModule>,
    pub(crate) unresolved_calls: usize,
}

/// A subset of a graph: handles into the owning [`CallGraph`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphView {
    pub seed: Option<NodeId>,
    pub groups: Vec<GroupId>,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<Edge>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups.iter().enumerate().map(|(i, g)| (GroupId(i), g))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// File groups in input order
    pub fn files(&self) -> &[GroupId] {
        &self.files
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a group, registering it with its parent
    pub(crate) fn add_group(&mut self, group: Group) -> GroupId {
        let id = GroupId(self.groups.len());
        if let Some(parent) = group.parent {
            self.groups[parent.0].subgroups.push(id);
        }
        if group.group_type == GroupType::File {
            self.files.push(id);
        }
        self.groups.push(group);
        id
    }

    /// Add a node, registering it with its owning group
    pub(crate) fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.groups[node.parent.0].nodes.push(id);
        self.nodes.push(node);
        id
    }

    /// The file group owning a node, found by walking parent links
    pub fn file_group(&self, node: NodeId) -> GroupId {
        let mut group = self.node(node).parent;
        while let Some(parent) = self.group(group).parent {
            group = parent;
        }
        group
    }

    pub fn file_token(&self, node: NodeId) -> &str {
        &self.group(self.file_group(node)).token
    }

    pub fn file_path(&self, node: NodeId) -> &Path {
        &self.module_of(self.file_group(node)).path
    }

    /// The class group owning a method
    pub fn class_of(&self, node: NodeId) -> Option<GroupId> {
        let parent = self.node(node).parent;
        (self.group(parent).group_type == GroupType::Class).then_some(parent)
    }

    /// `Class.method` for methods, the bare token otherwise
    pub fn qualified_name(&self, node: NodeId) -> String {
        let n = self.node(node);
        match self.class_of(node) {
            Some(class) => format!("{}.{}", self.group(class).token, n.token),
            None => n.token.clone(),
        }
    }

    /// `<file>.py <name>()`
    pub fn display_name(&self, node: NodeId) -> String {
        format!("{}.py {}()", self.file_token(node), self.qualified_name(node))
    }

    /// Source module of the file a group belongs to
    pub fn module_of(&self, group: GroupId) -> &SourceModule {
        &self.modules[self.group(group).module]
    }

    pub(crate) fn module_of_mut(&mut self, group: GroupId) -> &mut SourceModule {
        let index = self.group(group).module;
        &mut self.modules[index]
    }

    /// Source modules in file order
    pub fn modules(&self) -> &[SourceModule] {
        &self.modules
    }

    /// File group with the given token
    pub fn file_by_token(&self, token: &str) -> Option<GroupId> {
        self.files.iter().copied().find(|&file| self.group(file).token == token)
    }

    /// Nodes whose token or qualified name equals `name`
    pub fn find_nodes(&self, name: &str) -> Vec<NodeId> {
        self.nodes()
            .filter(|(id, node)| node.token == name || self.qualified_name(*id) == name)
            .map(|(id, _)| id)
            .collect()
    }

    /// The whole graph as a view
    pub fn full_view(&self) -> GraphView {
        GraphView {
            seed: None,
            groups: (0..self.groups.len()).map(GroupId).collect(),
            nodes: (0..self.nodes.len()).map(NodeId).collect(),
            edges: self.edges.clone(),
        }
    }

    pub fn get_statistics(&self) -> CallGraphStats {
        let classes = self.groups.iter().filter(|g| g.group_type == GroupType::Class).count();
        let callers: HashSet<NodeId> = self.edges.iter().map(|e| e.from).collect();
        let callees: HashSet<NodeId> = self.edges.iter().map(|e| e.to).collect();

        CallGraphStats {
            files: self.files.len(),
            classes,
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            unresolved_calls: self.unresolved_calls,
            entry_points: callers.difference(&callees).count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphStats {
    pub files: usize,
    pub classes: usize,
    pub nodes: usize,
    pub edges: usize,
    pub unresolved_calls: usize,
    /// Nodes that call something but are never called
    pub entry_points: usize,
}

impl fmt::Display for CallGraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} classes, {} nodes, {} edges, {} unresolved calls",
            self.files, self.classes, self.nodes, self.edges, self.unresolved_calls
        )
    }
}
