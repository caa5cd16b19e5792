//! In-memory source model for a parsed Python file.
//!
//! A [`SourceModule`] is a flat list of top-level [`Statement`]s. Functions and
//! classes keep their own source text so that a module can be pruned statement
//! by statement and written back out as valid Python with [`SourceModule::unparse`].

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use serde::{Deserialize, Serialize};

/// A call expression found inside a definition body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Called name (`g` in `g()` and in `b.g()`)
    pub name: String,
    /// Receiver expression text for attribute calls (`b` in `b.g()`)
    pub owner: Option<String>,
    /// 1-based line of the call
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportKind {
    /// `import pkg.mod [as alias]`
    Module,
    /// `from pkg import name [as alias]`, holding the imported name
    Symbol(String),
    /// `from pkg import *`
    Wildcard,
}

/// A name bound in a file by an import statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Name visible in the importing file
    pub local_name: String,
    /// Dotted module path as written, relative imports keep their dots
    pub module: String,
    pub kind: ImportKind,
    pub line: usize,
}

impl ImportBinding {
    /// Module path with relative-import dots removed
    pub fn module_path(&self) -> &str {
        self.module.trim_start_matches('.')
    }
}

/// Verbatim statement text with the calls it contains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub line_range: (usize, usize),
    pub calls: Vec<CallSite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    /// Decorators and signature, up to and including the colon
    pub header: String,
    /// Indentation of the body block
    pub body_indent: String,
    /// Full definition text including decorators
    pub text: String,
    pub docs: Option<String>,
    pub line_range: (usize, usize),
    pub calls: Vec<CallSite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassMember {
    Method(FunctionDef),
    Other(Snippet),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub header: String,
    pub body_indent: String,
    /// Base class expressions as written (`Base`, `mod.Base`)
    pub bases: Vec<String>,
    pub line_range: (usize, usize),
    pub members: Vec<ClassMember>,
}

impl ClassDef {
    pub fn methods(&self) -> impl Iterator<Item = &FunctionDef> {
        self.members.iter().filter_map(|member| match member {
            ClassMember::Method(method) => Some(method),
            ClassMember::Other(_) => None,
        })
    }

    fn unparse(&self) -> String {
        if self.members.is_empty() {
            return format!("{}\n{}pass", self.header, self.body_indent);
        }
        let blocks = self.members.iter().map(|member| match member {
            ClassMember::Method(method) => (method.text.clone(), true),
            ClassMember::Other(snippet) => (snippet.text.clone(), false),
        });
        format!("{}\n{}", self.header, join_blocks(blocks))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    Import(Snippet),
    Function(FunctionDef),
    Class(ClassDef),
    Other(Snippet),
}

/// Options for the skeleton view produced by [`SourceModule::structure`]
#[derive(Debug, Clone, Default)]
pub struct StructureOptions {
    pub strip_imports: bool,
    pub strip_globals: bool,
    /// Descriptions keyed by function name or `Class.method`
    pub descriptions: HashMap<String, String>,
    /// Fall back to a definition's own docstring when no description is given
    pub keep_docstrings: bool,
}

/// A parsed source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceModule {
    /// Path relative to the project base directory
    pub path: PathBuf,
    /// File stem, used to match import statements
    pub name: String,
    /// Relative path without extension, unique per file
    pub token: String,
    pub body: Vec<Statement>,
    /// Every import binding in the file, including function-local ones
    pub imports: Vec<ImportBinding>,
}

impl SourceModule {
    pub fn new(path: impl Into<PathBuf>, body: Vec<Statement>, imports: Vec<ImportBinding>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let token = module_token(&path);

        Self {
            path,
            name,
            token,
            body,
            imports,
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.body.iter().filter_map(|statement| match statement {
            Statement::Function(function) => Some(function),
            _ => None,
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.body.iter().filter_map(|statement| match statement {
            Statement::Class(class) => Some(class),
            _ => None,
        })
    }

    /// Calls made by module-level code, including class bodies outside methods
    pub fn global_calls(&self) -> Vec<CallSite> {
        let mut calls = Vec::new();
        for statement in &self.body {
            match statement {
                Statement::Other(snippet) | Statement::Import(snippet) => {
                    calls.extend(snippet.calls.iter().cloned());
                }
                Statement::Class(class) => {
                    for member in &class.members {
                        if let ClassMember::Other(snippet) = member {
                            calls.extend(snippet.calls.iter().cloned());
                        }
                    }
                }
                Statement::Function(_) => {}
            }
        }
        calls
    }

    /// Names that may refer to other project modules: the last segment of
    /// every imported module plus every imported symbol
    pub fn imported_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };

        for binding in &self.imports {
            if let Some(last) = binding.module_path().rsplit('.').next() {
                push(last);
            }
            if let ImportKind::Symbol(symbol) = &binding.kind {
                push(symbol);
            }
        }
        names
    }

    /// Serialize the (possibly pruned) module back to Python source
    pub fn unparse(&self) -> String {
        let blocks = self.body.iter().map(|statement| match statement {
            Statement::Import(snippet) | Statement::Other(snippet) => (snippet.text.clone(), false),
            Statement::Function(function) => (function.text.clone(), true),
            Statement::Class(class) => (class.unparse(), true),
        });
        let mut code = join_blocks(blocks);
        if !code.is_empty() {
            code.push('\n');
        }
        code
    }

    /// Render a skeleton of the module where every body is replaced by `...`
    pub fn structure(&self, options: &StructureOptions) -> String {
        let mut blocks = Vec::new();

        for statement in &self.body {
            match statement {
                Statement::Import(snippet) => {
                    if !options.strip_imports {
                        blocks.push((snippet.text.clone(), false));
                    }
                }
                Statement::Other(snippet) => {
                    if !options.strip_globals {
                        blocks.push((snippet.text.clone(), false));
                    }
                }
                Statement::Function(function) => {
                    let description = options.descriptions.get(&function.name);
                    blocks.push((function_skeleton(function, description, options), true));
                }
                Statement::Class(class) => {
                    let mut lines = vec![class.header.clone()];
                    for member in &class.members {
                        match member {
                            ClassMember::Method(method) => {
                                let key = format!("{}.{}", class.name, method.name);
                                lines.push(function_skeleton(method, options.descriptions.get(&key), options));
                            }
                            ClassMember::Other(snippet) => lines.push(snippet.text.clone()),
                        }
                    }
                    if class.members.is_empty() {
                        lines.push(format!("{}pass", class.body_indent));
                    }
                    blocks.push((lines.join("\n"), true));
                }
            }
        }

        let mut code = join_blocks(blocks.into_iter());
        if !code.is_empty() {
            code.push('\n');
        }
        code
    }
}

fn function_skeleton(function: &FunctionDef, description: Option<&String>, options: &StructureOptions) -> String {
    let docstring = description
        .cloned()
        .or_else(|| options.keep_docstrings.then(|| function.docs.clone()).flatten());

    let mut skeleton = function.header.clone();
    if let Some(doc) = docstring {
        skeleton.push_str(&format!(
            "\n{}\"\"\"{}\"\"\"",
            function.body_indent,
            doc.replace("\"\"\"", "\\\"\\\"\\\"")
        ));
    }
    skeleton.push_str(&format!("\n{}...", function.body_indent));
    skeleton
}

/// Join statement blocks, separating definitions with a blank line
fn join_blocks(blocks: impl Iterator<Item = (String, bool)>) -> String {
    let mut out = String::new();
    let mut previous_is_definition = false;

    for (index, (text, is_definition)) in blocks.enumerate() {
        if index > 0 {
            out.push('\n');
            if is_definition || previous_is_definition {
                out.push('\n');
            }
        }
        out.push_str(&text);
        previous_is_definition = is_definition;
    }
    out
}

/// `pkg/util.py` -> `pkg/util`
pub fn module_token(path: &Path) -> String {
    path.with_extension("")
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
