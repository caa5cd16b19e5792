use std::path::Path;
use tree_sitter::{Node, Parser};

use crate::error::{FlowdocError, Result};
use super::LanguageParser;
use super::super::source::{
    CallSite, ClassDef, ClassMember, FunctionDef, ImportBinding, ImportKind, Snippet, SourceModule,
    Statement,
};

/// Python-specific parser using Tree-sitter
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let python_language = tree_sitter_python::language();
        parser.set_language(&python_language)
            .map_err(|e| FlowdocError::Config(format!("Failed to set Python language: {}", e)))?;

        Ok(Self { parser })
    }
}

impl LanguageParser for PythonParser {
    fn parse(&mut self, content: &str, file_path: &Path) -> Result<SourceModule> {
        let tree = self.parser.parse(content, None)
            .ok_or_else(|| FlowdocError::parse(file_path, "Failed to parse Python code"))?;

        let root_node = tree.root_node();
        if root_node.has_error() {
            let line = first_error_line(root_node).unwrap_or(1);
            return Err(FlowdocError::parse(
                file_path,
                format!("invalid syntax near line {}", line),
            ));
        }

        let mut body = Vec::new();
        let mut cursor = root_node.walk();
        for child in root_node.named_children(&mut cursor) {
            body.push(self.parse_statement(child, content));
        }

        let mut imports = Vec::new();
        collect_imports(root_node, content, &mut imports);

        Ok(SourceModule::new(file_path, body, imports))
    }

    fn file_extensions(&self) -> &[&str] {
        &["py"]
    }

    fn language_name(&self) -> &str {
        "python"
    }
}

impl PythonParser {
    /// Classify a top-level statement
    fn parse_statement(&self, node: Node, source: &str) -> Statement {
        match node.kind() {
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                Statement::Import(self.snippet(node, source, ""))
            }
            "function_definition" => match self.parse_python_function(node, node, source, "") {
                Some(function) => Statement::Function(function),
                None => Statement::Other(self.snippet(node, source, "")),
            },
            "class_definition" => match self.parse_python_class(node, node, source) {
                Some(class) => Statement::Class(class),
                None => Statement::Other(self.snippet(node, source, "")),
            },
            "decorated_definition" => {
                let definition = node.child_by_field_name("definition");
                let parsed = match definition.map(|d| (d.kind(), d)) {
                    Some(("function_definition", def)) => self
                        .parse_python_function(node, def, source, "")
                        .map(Statement::Function),
                    Some(("class_definition", def)) => self
                        .parse_python_class(node, def, source)
                        .map(Statement::Class),
                    _ => None,
                };
                parsed.unwrap_or_else(|| Statement::Other(self.snippet(node, source, "")))
            }
            _ => Statement::Other(self.snippet(node, source, "")),
        }
    }

    /// Parse a Python class definition. `outer` is the decorated wrapper when present.
    fn parse_python_class(&self, outer: Node, node: Node, source: &str) -> Option<ClassDef> {
        let name = node_text(node.child_by_field_name("name")?, source);
        let body_node = node.child_by_field_name("body")?;
        let class_indent = leading_indent(source, outer.start_byte()).unwrap_or("");
        let body_indent = leading_indent(source, body_node.start_byte())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}    ", class_indent));

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if base.kind() == "keyword_argument" {
                    continue;
                }
                bases.push(node_text(base, source));
            }
        }

        let mut members = Vec::new();
        let mut cursor = body_node.walk();
        for child in body_node.named_children(&mut cursor) {
            let method = match child.kind() {
                "function_definition" => self.parse_python_function(child, child, source, &body_indent),
                "decorated_definition" => child
                    .child_by_field_name("definition")
                    .filter(|def| def.kind() == "function_definition")
                    .and_then(|def| self.parse_python_function(child, def, source, &body_indent)),
                _ => None,
            };
            members.push(match method {
                Some(method) => ClassMember::Method(method),
                None => ClassMember::Other(self.snippet(child, source, &body_indent)),
            });
        }

        Some(ClassDef {
            name,
            header: header_text(source, outer, body_node, class_indent),
            body_indent,
            bases,
            line_range: line_range(outer),
            members,
        })
    }

    /// Parse a Python function definition. `outer` is the decorated wrapper when present.
    fn parse_python_function(&self, outer: Node, node: Node, source: &str, fallback_indent: &str) -> Option<FunctionDef> {
        let name = node_text(node.child_by_field_name("name")?, source);
        let body_node = node.child_by_field_name("body")?;
        let def_indent = leading_indent(source, outer.start_byte()).unwrap_or(fallback_indent);
        let body_indent = leading_indent(source, body_node.start_byte())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}    ", def_indent));

        let mut calls = Vec::new();
        collect_calls(body_node, source, &mut calls);

        Some(FunctionDef {
            name,
            header: header_text(source, outer, body_node, def_indent),
            body_indent,
            text: block_text(source, outer, def_indent),
            docs: self.extract_docstring_from_body(node, source),
            line_range: line_range(outer),
            calls,
        })
    }

    /// Verbatim statement text with the calls it contains
    fn snippet(&self, node: Node, source: &str, fallback_indent: &str) -> Snippet {
        let indent = leading_indent(source, node.start_byte()).unwrap_or(fallback_indent);
        let mut calls = Vec::new();
        collect_calls(node, source, &mut calls);

        Snippet {
            text: block_text(source, node, indent),
            line_range: line_range(node),
            calls,
        }
    }

    /// Extract docstring from function body
    fn extract_docstring_from_body(&self, node: Node, source: &str) -> Option<String> {
        let body_node = node.child_by_field_name("body")?;
        let first = body_node.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0).filter(|child| child.kind() == "string")?;
        let docstring = node_text(string, source);

        // Clean up the docstring (remove quotes and extra whitespace)
        let cleaned = docstring
            .trim_start_matches("\"\"\"")
            .trim_end_matches("\"\"\"")
            .trim_start_matches("'''")
            .trim_end_matches("'''")
            .trim_matches('"')
            .trim_matches('\'')
            .trim();

        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    }
}

/// Collect every resolvable call expression below `node`
fn collect_calls(node: Node, source: &str, calls: &mut Vec<CallSite>) {
    if node.kind() == "call" {
        if let Some(function) = node.child_by_field_name("function") {
            let line = function.start_position().row + 1;
            match function.kind() {
                "identifier" => calls.push(CallSite {
                    name: node_text(function, source),
                    owner: None,
                    line,
                }),
                "attribute" => {
                    let object = function.child_by_field_name("object");
                    let attribute = function.child_by_field_name("attribute");
                    if let (Some(object), Some(attribute)) = (object, attribute) {
                        calls.push(CallSite {
                            name: node_text(attribute, source),
                            owner: Some(node_text(object, source)),
                            line,
                        });
                    }
                }
                // Calls on call results, subscripts, lambdas: dynamic
                _ => {}
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_calls(child, source, calls);
    }
}

/// Collect import bindings anywhere in the file
fn collect_imports(node: Node, source: &str, imports: &mut Vec<ImportBinding>) {
    let line = node.start_position().row + 1;
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                let (module, alias) = aliased_name(name, source);
                imports.push(ImportBinding {
                    local_name: alias.unwrap_or_else(|| module.clone()),
                    module,
                    kind: ImportKind::Module,
                    line,
                });
            }
        }
        "import_from_statement" => {
            let module = node
                .child_by_field_name("module_name")
                .map(|m| node_text(m, source))
                .unwrap_or_default();

            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "wildcard_import" {
                    imports.push(ImportBinding {
                        local_name: "*".to_string(),
                        module: module.clone(),
                        kind: ImportKind::Wildcard,
                        line,
                    });
                }
            }

            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                let (symbol, alias) = aliased_name(name, source);
                imports.push(ImportBinding {
                    local_name: alias.unwrap_or_else(|| symbol.clone()),
                    module: module.clone(),
                    kind: ImportKind::Symbol(symbol),
                    line,
                });
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_imports(child, source, imports);
            }
        }
    }
}

/// `name` or `name as alias`
fn aliased_name(node: Node, source: &str) -> (String, Option<String>) {
    if node.kind() == "aliased_import" {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source))
            .unwrap_or_default();
        let alias = node.child_by_field_name("alias").map(|a| node_text(a, source));
        (name, alias)
    } else {
        (node_text(node, source), None)
    }
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error_line)
}

/// Extract text content of a node
fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

fn line_range(node: Node) -> (usize, usize) {
    (node.start_position().row + 1, node.end_position().row + 1)
}

/// Whitespace between the start of the line and `byte`, if nothing else precedes it
fn leading_indent(source: &str, byte: usize) -> Option<&str> {
    let line_start = source[..byte].rfind('\n').map_or(0, |pos| pos + 1);
    let prefix = &source[line_start..byte];
    prefix.chars().all(|c| c == ' ' || c == '\t').then_some(prefix)
}

/// Node text prefixed with its indentation
fn block_text(source: &str, node: Node, indent: &str) -> String {
    format!("{}{}", indent, source[node.byte_range()].trim_end())
}

/// Decorators and signature of a definition, without its body
fn header_text(source: &str, outer: Node, body: Node, indent: &str) -> String {
    format!("{}{}", indent, source[outer.start_byte()..body.start_byte()].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<SourceModule> {
        PythonParser::new()?.parse(source, Path::new("pkg/a.py"))
    }

    #[test]
    fn extracts_definitions_in_source_order() {
        let module = parse(
            "import b\n\nX = 1\n\ndef f():\n    b.g()\n\nclass A(Base):\n    def m(self):\n        self.n()\n\n    def n(self):\n        pass\n",
        )
        .unwrap();

        assert_eq!(module.name, "a");
        assert_eq!(module.token, "pkg/a");
        assert_eq!(module.body.len(), 4);
        assert!(matches!(module.body[0], Statement::Import(_)));
        assert!(matches!(module.body[1], Statement::Other(_)));

        let f = module.functions().next().unwrap();
        assert_eq!(f.name, "f");
        assert_eq!(f.calls[0].name, "g");
        assert_eq!(f.calls[0].owner.as_deref(), Some("b"));

        let class = module.classes().next().unwrap();
        assert_eq!(class.bases, vec!["Base"]);
        let methods: Vec<_> = class.methods().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["m", "n"]);
        assert_eq!(class.methods().next().unwrap().calls[0].owner.as_deref(), Some("self"));
    }

    #[test]
    fn class_keywords_are_not_bases() {
        let module = parse("class A(Base, mod.Mixin, metaclass=Meta):\n    pass\n").unwrap();
        let class = module.classes().next().unwrap();

        assert_eq!(class.bases, vec!["Base", "mod.Mixin"]);
    }

    #[test]
    fn decorated_and_async_functions_are_definitions() {
        let module = parse("@cache\nasync def fetch():\n    await load()\n").unwrap();
        let function = module.functions().next().unwrap();

        assert_eq!(function.header, "@cache\nasync def fetch():");
        assert!(function.text.starts_with("@cache\n"));
        assert_eq!(function.calls[0].name, "load");
    }

    #[test]
    fn nested_calls_are_all_collected() {
        let module = parse("def f():\n    return outer(inner(1), mod.helper())\n").unwrap();
        let names: Vec<_> = module.functions().next().unwrap().calls.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["outer", "inner", "helper"]);
    }

    #[test]
    fn records_import_bindings() {
        let module = parse(
            "import os.path as p\nfrom .b import g as h, k\nfrom c import *\n\ndef f():\n    import d\n",
        )
        .unwrap();

        let imports = &module.imports;
        assert_eq!(imports.len(), 5);
        assert_eq!(imports[0].local_name, "p");
        assert_eq!(imports[0].module, "os.path");
        assert_eq!(imports[0].kind, ImportKind::Module);
        assert_eq!(imports[1].local_name, "h");
        assert_eq!(imports[1].module_path(), "b");
        assert_eq!(imports[1].kind, ImportKind::Symbol("g".to_string()));
        assert_eq!(imports[2].local_name, "k");
        assert_eq!(imports[3].kind, ImportKind::Wildcard);
        assert_eq!(imports[4].local_name, "d");
        assert_eq!(imports[4].line, 6);
    }

    #[test]
    fn one_line_bodies_get_synthesized_indentation() {
        let module = parse("class A: pass\n").unwrap();
        let class = module.classes().next().unwrap();
        assert_eq!(class.header, "class A:");
        assert_eq!(class.body_indent, "    ");
        assert_eq!(module.unparse(), "class A:\n    pass\n");
    }

    #[test]
    fn syntax_errors_carry_the_path() {
        let err = parse("def broken(:\n    pass\n").unwrap_err();
        match err {
            FlowdocError::Parse { path, .. } => assert_eq!(path, Path::new("pkg/a.py")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
