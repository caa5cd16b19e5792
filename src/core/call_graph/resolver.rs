// src/core/call_graph/resolver.rs
//! Static resolution of call sites to graph nodes.
//!
//! Resolution only looks at definitions in the same file and at names imported
//! from other files of the input set. Anything else (library calls, dynamic
//! dispatch, attribute chains on instances) stays unresolved and produces no edge.

use std::collections::{HashMap, HashSet};

use super::super::source::{CallSite, ImportBinding, ImportKind};
use super::{CallGraph, GroupId, GroupType, NodeId, NodeKind};

/// Outcome of resolving one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(NodeId),
    /// No edge is created
    Unresolved,
}

/// Where a call is made from
#[derive(Debug, Clone, Copy)]
pub struct CallerScope {
    pub node: NodeId,
    pub file: GroupId,
    pub class: Option<GroupId>,
}

/// Strategy used by the graph builder to turn call sites into edges
pub trait CallResolver {
    fn resolve(&self, symbols: &SymbolTable, caller: &CallerScope, call: &CallSite) -> Resolution;
}

/// Definitions and imports of every file, keyed by owning group
#[derive(Debug, Default)]
pub struct SymbolTable {
    functions: HashMap<(GroupId, String), NodeId>,
    classes: HashMap<(GroupId, String), GroupId>,
    methods: HashMap<(GroupId, String), NodeId>,
    /// Owning file and base class expressions of every class
    class_info: HashMap<GroupId, (GroupId, Vec<String>)>,
    files_by_name: HashMap<String, Vec<GroupId>>,
    files_by_token: HashMap<String, GroupId>,
    file_tokens: HashMap<GroupId, String>,
    bindings: HashMap<GroupId, Vec<ImportBinding>>,
}

impl SymbolTable {
    pub fn from_graph(graph: &CallGraph) -> Self {
        let mut table = Self::default();

        for &file in graph.files() {
            let module = graph.module_of(file);
            table.files_by_name.entry(module.name.clone()).or_default().push(file);
            table.file_tokens.insert(file, graph.group(file).token.clone());
            table.files_by_token.insert(graph.group(file).token.clone(), file);
            table.bindings.insert(file, module.imports.clone());

            for &node in &graph.group(file).nodes {
                let n = graph.node(node);
                if n.kind == NodeKind::Function {
                    table.functions.insert((file, n.token.clone()), node);
                }
            }

            for &class in &graph.group(file).subgroups {
                let group = graph.group(class);
                if group.group_type != GroupType::Class {
                    continue;
                }
                table.classes.insert((file, group.token.clone()), class);
                let bases = module
                    .classes()
                    .find(|def| def.name == group.token)
                    .map(|def| def.bases.clone())
                    .unwrap_or_default();
                table.class_info.insert(class, (file, bases));
                for &method in &group.nodes {
                    table.methods.insert((class, graph.node(method).token.clone()), method);
                }
            }
        }

        table
    }

    pub fn function(&self, file: GroupId, name: &str) -> Option<NodeId> {
        self.functions.get(&(file, name.to_string())).copied()
    }

    pub fn class(&self, file: GroupId, name: &str) -> Option<GroupId> {
        self.classes.get(&(file, name.to_string())).copied()
    }

    pub fn method(&self, class: GroupId, name: &str) -> Option<NodeId> {
        self.methods.get(&(class, name.to_string())).copied()
    }

    /// Method `name` of `class`, or of the nearest base class in the input set
    /// that defines it. Bases are searched depth-first in declaration order.
    pub fn inherited_method(&self, class: GroupId, name: &str) -> Option<NodeId> {
        let mut visited = HashSet::new();
        self.find_inherited(class, name, &mut visited)
    }

    fn find_inherited(&self, class: GroupId, name: &str, visited: &mut HashSet<GroupId>) -> Option<NodeId> {
        if !visited.insert(class) {
            return None;
        }
        if let Some(method) = self.method(class, name) {
            return Some(method);
        }

        let (file, bases) = self.class_info.get(&class)?;
        bases
            .iter()
            .filter_map(|base| self.class_named(*file, base))
            .find_map(|base| self.find_inherited(base, name, visited))
    }

    /// Class a name written in `file` refers to: a local class, an imported
    /// class, or `module.Class` through a module import
    pub fn class_named(&self, file: GroupId, written: &str) -> Option<GroupId> {
        if let Some((owner, name)) = written.rsplit_once('.') {
            let binding = self.binding(file, owner)?;
            return match binding.kind {
                ImportKind::Module => self.class(self.module(&binding.module)?, name),
                _ => None,
            };
        }

        if let Some(class) = self.class(file, written) {
            return Some(class);
        }
        let binding = self.binding(file, written)?;
        match &binding.kind {
            ImportKind::Symbol(symbol) => self.class(self.module_from(file, &binding.module)?, symbol),
            _ => None,
        }
    }

    /// A function, or a class called as a constructor (its `__init__`)
    pub fn callable(&self, file: GroupId, name: &str) -> Option<NodeId> {
        self.function(file, name)
            .or_else(|| self.class(file, name).and_then(|class| self.method(class, "__init__")))
    }

    /// File for a dotted module path. Matches on the last segment; several
    /// files with that stem are disambiguated by their relative path.
    pub fn module(&self, dotted: &str) -> Option<GroupId> {
        let last = dotted.rsplit('.').next().filter(|name| !name.is_empty())?;
        let candidates = self.files_by_name.get(last)?;
        if let [only] = candidates.as_slice() {
            return Some(*only);
        }

        let wanted = dotted.replace('.', "/");
        let mut matching = candidates.iter().copied().filter(|file| {
            self.file_tokens
                .get(file)
                .map_or(false, |token| *token == wanted || token.ends_with(&format!("/{}", wanted)))
        });
        match (matching.next(), matching.next()) {
            (Some(file), None) => Some(file),
            _ => None,
        }
    }

    /// File for a module path as written in `file`. Relative paths (`.mod`,
    /// `..pkg.mod`) are anchored at the importing file's package first and
    /// fall back to [`Self::module`] on their dotless form.
    pub fn module_from(&self, file: GroupId, written: &str) -> Option<GroupId> {
        let rest = written.trim_start_matches('.');
        let level = written.len() - rest.len();
        if level == 0 {
            return self.module(written);
        }

        self.anchored_module(file, level, rest)
            .or_else(|| self.module(rest))
    }

    fn anchored_module(&self, file: GroupId, level: usize, rest: &str) -> Option<GroupId> {
        let mut parts: Vec<&str> = self.file_tokens.get(&file)?.split('/').collect();
        // the importer's own name, then one package per extra dot
        for _ in 0..level {
            parts.pop()?;
        }
        parts.extend(rest.split('.').filter(|part| !part.is_empty()));
        if parts.is_empty() {
            return None;
        }

        let target = parts.join("/");
        self.files_by_token
            .get(&target)
            .or_else(|| self.files_by_token.get(&format!("{}/__init__", target)))
            .copied()
    }

    /// The binding for `local_name` in a file, later imports shadowing earlier ones
    pub fn binding(&self, file: GroupId, local_name: &str) -> Option<&ImportBinding> {
        self.bindings
            .get(&file)?
            .iter()
            .rev()
            .find(|binding| binding.local_name == local_name)
    }
}

/// Resolves calls through same-file definitions and import aliases
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticResolver;

impl StaticResolver {
    fn resolve_bare(&self, symbols: &SymbolTable, caller: &CallerScope, name: &str) -> Option<NodeId> {
        if let Some(node) = symbols.callable(caller.file, name) {
            return Some(node);
        }

        let binding = symbols.binding(caller.file, name)?;
        match &binding.kind {
            ImportKind::Symbol(symbol) => {
                let file = symbols.module_from(caller.file, &binding.module)?;
                symbols.callable(file, symbol)
            }
            ImportKind::Module | ImportKind::Wildcard => None,
        }
    }

    fn resolve_attribute(&self, symbols: &SymbolTable, caller: &CallerScope, owner: &str, name: &str) -> Option<NodeId> {
        if owner == "self" || owner == "cls" {
            return caller.class.and_then(|class| symbols.inherited_method(class, name));
        }

        if let Some(class) = symbols.class(caller.file, owner) {
            return symbols.inherited_method(class, name);
        }

        let binding = symbols.binding(caller.file, owner)?;
        match &binding.kind {
            ImportKind::Module => {
                let file = symbols.module(&binding.module)?;
                symbols.callable(file, name)
            }
            ImportKind::Symbol(symbol) => {
                // from module import Class
                let class = symbols
                    .module_from(caller.file, &binding.module)
                    .and_then(|file| symbols.class(file, symbol));
                if let Some(class) = class {
                    return symbols.inherited_method(class, name);
                }

                // from package import module, dots of a relative import kept
                let dotted = match binding.module_path() {
                    "" => format!("{}{}", binding.module, symbol),
                    _ => format!("{}.{}", binding.module, symbol),
                };
                let file = symbols.module_from(caller.file, &dotted)?;
                symbols.callable(file, name)
            }
            ImportKind::Wildcard => None,
        }
    }
}

impl CallResolver for StaticResolver {
    fn resolve(&self, symbols: &SymbolTable, caller: &CallerScope, call: &CallSite) -> Resolution {
        let resolved = match call.owner.as_deref() {
            None => self.resolve_bare(symbols, caller, &call.name),
            Some(owner) => self.resolve_attribute(symbols, caller, owner, &call.name),
        };

        match resolved {
            Some(node) => Resolution::Resolved(node),
            None => Resolution::Unresolved,
        }
    }
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

    fn callees_of(graph: &CallGraph, caller: &str) -> Vec<String> {
        let from = graph.find_nodes(caller)[0];
        graph
            .edges()
            .iter()
            .filter(|e| e.from == from)
            .map(|e| graph.display_name(e.to))
            .collect()
    }

    #[test]
    fn bare_names_prefer_same_file_definitions() {
        let graph = build(&[
            ("a.py", "from b import g\n\ndef g():\n    pass\n\ndef f():\n    g()\n"),
            ("b.py", "def g():\n    pass\n"),
        ]);
        assert_eq!(callees_of(&graph, "f"), vec!["a.py g()"]);
    }

    #[test]
    fn symbol_imports_follow_aliases() {
        let graph = build(&[
            ("a.py", "from pkg.b import g as helper\n\ndef f():\n    helper()\n"),
            ("pkg/b.py", "def g():\n    pass\n"),
        ]);
        assert_eq!(callees_of(&graph, "f"), vec!["pkg/b.py g()"]);
    }

    #[test]
    fn class_calls_resolve_to_the_constructor() {
        let graph = build(&[
            ("a.py", "from b import Client\n\ndef f():\n    Client()\n"),
            ("b.py", "class Client:\n    def __init__(self):\n        pass\n"),
        ]);
        assert_eq!(callees_of(&graph, "f"), vec!["b.py Client.__init__()"]);
    }

    #[test]
    fn self_calls_stay_within_the_class() {
        let graph = build(&[(
            "a.py",
            "def run():\n    pass\n\nclass A:\n    def run(self):\n        pass\n\n    def go(self):\n        self.run()\n",
        )]);
        assert_eq!(callees_of(&graph, "go"), vec!["a.py A.run()"]);
    }

    #[test]
    fn imported_class_methods_and_package_modules_resolve() {
        let graph = build(&[
            (
                "a.py",
                "from b import Client\nfrom pkg import util\n\ndef f():\n    Client.connect()\n    util.helper()\n",
            ),
            ("b.py", "class Client:\n    def connect(self):\n        pass\n"),
            ("pkg/util.py", "def helper():\n    pass\n"),
        ]);
        assert_eq!(
            callees_of(&graph, "f"),
            vec!["b.py Client.connect()", "pkg/util.py helper()"]
        );
    }

    #[test]
    fn ambiguous_module_names_use_the_dotted_path() {
        let graph = build(&[
            ("a.py", "import x.util\n\ndef f():\n    x.util.helper()\n"),
            ("x/util.py", "def helper():\n    pass\n"),
            ("y/util.py", "def helper():\n    pass\n"),
        ]);
        assert_eq!(callees_of(&graph, "f"), vec!["x/util.py helper()"]);
    }

    #[test]
    fn relative_imports_prefer_the_importing_package() {
        let graph = build(&[
            (
                "services/app.py",
                "from . import store\nfrom .db import connect\n\ndef f():\n    store.save()\n    connect()\n",
            ),
            ("services/store.py", "def save():\n    pass\n"),
            ("services/db.py", "def connect():\n    pass\n"),
            ("legacy/store.py", "def save():\n    pass\n"),
            ("legacy/db.py", "def connect():\n    pass\n"),
        ]);
        assert_eq!(
            callees_of(&graph, "f"),
            vec!["services/store.py save()", "services/db.py connect()"]
        );
    }

    #[test]
    fn parent_relative_imports_climb_one_package_per_dot() {
        let graph = build(&[
            ("pkg/sub/run.py", "from ..util import helper\n\ndef f():\n    helper()\n"),
            ("pkg/util.py", "def helper():\n    pass\n"),
            ("other/util.py", "def helper():\n    pass\n"),
        ]);
        assert_eq!(callees_of(&graph, "f"), vec!["pkg/util.py helper()"]);
    }

    #[test]
    fn inherited_methods_resolve_through_base_classes() {
        let graph = build(&[
            (
                "a.py",
                "import base\nfrom b import Mixin\n\nclass Local:\n    def ping(self):\n        pass\n\nclass A(Local, Mixin, base.Root):\n    def go(self):\n        self.ping()\n        self.mix()\n        self.root()\n        self.missing()\n",
            ),
            ("b.py", "class Mixin:\n    def mix(self):\n        pass\n"),
            ("base.py", "class Root:\n    def root(self):\n        pass\n"),
        ]);
        assert_eq!(
            callees_of(&graph, "go"),
            vec!["a.py Local.ping()", "b.py Mixin.mix()", "base.py Root.root()"]
        );
    }

    #[test]
    fn cyclic_bases_do_not_loop() {
        let graph = build(&[(
            "a.py",
            "class A(B):\n    def go(self):\n        self.nothing()\n\nclass B(A):\n    pass\n",
        )]);
        assert!(callees_of(&graph, "go").is_empty());
    }

    #[test]
    fn wildcard_imports_are_never_resolved() {
        let graph = build(&[
            ("a.py", "from b import *\n\ndef f():\n    g()\n"),
            ("b.py", "def g():\n    pass\n"),
        ]);
        assert!(callees_of(&graph, "f").is_empty());
    }
}
