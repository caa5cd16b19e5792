// src/core/call_graph/pruner.rs - Trims source modules to a set of definitions
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::super::source::{ClassMember, SourceModule, Statement};
use super::call_graph::{CallGraph, GroupType, NodeId};

/// Removes every definition whose node is not kept from the graph's source
/// modules. Destructive: clone the graph first to keep the full sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreePruner {
    pub strip_imports: bool,
    pub strip_globals: bool,
}

impl Default for TreePruner {
    fn default() -> Self {
        Self {
            strip_imports: false,
            strip_globals: true,
        }
    }
}

impl TreePruner {
    pub fn new(strip_imports: bool, strip_globals: bool) -> Self {
        Self {
            strip_imports,
            strip_globals,
        }
    }

    pub fn trim(&self, graph: &mut CallGraph, keep: &HashSet<NodeId>) {
        for file in graph.files().to_vec() {
            let group = graph.group(file);

            let functions: HashSet<String> = group
                .nodes
                .iter()
                .filter(|&&id| keep.contains(&id))
                .map(|&id| graph.node(id).token.clone())
                .collect();

            let mut methods: HashMap<String, HashSet<String>> = HashMap::new();
            for &class in &group.subgroups {
                let class_group = graph.group(class);
                if class_group.group_type != GroupType::Class {
                    continue;
                }
                let kept: HashSet<String> = class_group
                    .nodes
                    .iter()
                    .filter(|&&id| keep.contains(&id))
                    .map(|&id| graph.node(id).token.clone())
                    .collect();
                if !kept.is_empty() {
                    methods.insert(class_group.token.clone(), kept);
                }
            }

            let module = graph.module_of_mut(file);
            let before = module.body.len();
            self.trim_module(module, &functions, &methods);
            debug!(
                "pruned {}: {} of {} statements kept",
                module.token,
                module.body.len(),
                before
            );
        }
    }

    fn trim_module(
        &self,
        module: &mut SourceModule,
        functions: &HashSet<String>,
        methods: &HashMap<String, HashSet<String>>,
    ) {
        module.body.retain_mut(|statement| match statement {
            Statement::Function(function) => functions.contains(&function.name),
            Statement::Class(class) => match methods.get(&class.name) {
                Some(kept) => {
                    class.members.retain(|member| match member {
                        ClassMember::Method(method) => kept.contains(&method.name),
                        ClassMember::Other(_) => true,
                    });
                    true
                }
                None => false,
            },
            Statement::Import(_) => !self.strip_imports,
            Statement::Other(_) => !self.strip_globals,
        });
    }
}
