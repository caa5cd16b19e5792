// src/core/engine.rs
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::FlowdocError;
use super::call_graph::{
    extract_subset, CallGraph, DependencyContext, FlowExtractor, GraphBuilder, NodeId, SubsetParams,
    TreePruner,
};
use super::render::{GraphRenderer, GraphSnapshot, RenderOutcome};
use super::source::{module_token, StructureOptions};
use super::{CodeParser, ParseFailure};

/// Main orchestration engine: parses sources, builds call graphs and runs
/// flow extraction and rendering on them
pub struct Engine {
    config: Config,
    parser: CodeParser,
}

impl Engine {
    /// Create a new engine, optionally overriding the configured base directory
    pub async fn new(config_path: Option<&Path>, base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::load_or_default(config_path)?;
        if let Some(base_dir) = base_dir {
            config.project.base_dir = base_dir;
        }

        debug!("Loaded configuration: {:?}", config);
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let parser = CodeParser::new(&config.project, &config.parsing)?;
        Ok(Self { config, parser })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse `paths` and build their call graph. Files that fail to parse are
    /// left out of the graph and returned alongside it.
    pub fn build_graph(&mut self, paths: &[PathBuf]) -> Result<(CallGraph, Vec<ParseFailure>)> {
        let report = self.parser.parse_files(paths)?;
        if !report.failures.is_empty() {
            warn!("{} of {} files left out of the graph", report.failures.len(), paths.len());
        }

        Ok((GraphBuilder::new().build(report.modules), report.failures))
    }

    /// Project files whose name matches something `file` imports
    pub fn module_deps(&mut self, file: &Path) -> Result<Vec<PathBuf>> {
        let base = self.parser.relative_path(file);
        let module = self.parser.parse_file(&base)?;
        let names = module.imported_names();

        let deps: Vec<PathBuf> = self
            .parser
            .discover()?
            .into_iter()
            .filter(|path| *path != base)
            .filter(|path| {
                path.file_stem()
                    .map_or(false, |stem| names.iter().any(|name| stem.to_string_lossy() == *name))
            })
            .collect();

        debug!("{} depends on {} project files", base.display(), deps.len());
        Ok(deps)
    }

    /// Execution flow and pruned sources for `base` in the context of `with`,
    /// or of the files it imports when `with` is empty
    pub fn dependency_context(&mut self, base: &Path, with: &[PathBuf], params: SubsetParams) -> Result<DependencyContext> {
        let base = self.parser.relative_path(base);
        let deps = if with.is_empty() {
            self.module_deps(&base)?
        } else {
            with.iter().map(|path| self.parser.relative_path(path)).collect()
        };

        let mut files = vec![base.clone()];
        for dep in deps {
            if !files.contains(&dep) {
                files.push(dep);
            }
        }
        info!("Extracting flow of {} across {} files", base.display(), files.len());

        let (mut graph, skipped) = self.build_graph(&files)?;
        let base_file = match graph.file_by_token(&module_token(&base)) {
            Some(file) => file,
            None => match skipped.iter().find(|failure| failure.path == base) {
                Some(failure) => bail!("{} could not be parsed: {}", base.display(), failure.message),
                None => bail!("{} could not be parsed", base.display()),
            },
        };

        let pruner = TreePruner::new(self.config.flow.strip_imports, self.config.flow.strip_globals);
        let mut context = FlowExtractor::new(params, pruner).extract(&mut graph, base_file);
        context.skipped = skipped;
        Ok(context)
    }

    /// Write a default configuration file
    pub async fn init(&self, path: Option<PathBuf>) -> Result<()> {
        let target_dir = match path {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to read the current directory")?,
        };
        info!("Initializing Flowdoc in: {}", target_dir.display());

        let config_file = target_dir.join("Flowdoc.toml");
        if config_file.exists() {
            warn!("{} already exists, leaving it untouched", config_file.display());
            return Ok(());
        }

        tokio::fs::create_dir_all(&target_dir).await?;
        Config::default().save(&config_file)?;
        info!("Wrote {}", config_file.display());
        Ok(())
    }

    /// Print or write the dependency context of a base file
    pub async fn flow(
        &mut self,
        base: PathBuf,
        with: Vec<PathBuf>,
        upstream: Option<usize>,
        downstream: Option<usize>,
        json: bool,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let params = SubsetParams {
            upstream_depth: upstream.unwrap_or(self.config.flow.upstream_depth),
            downstream_depth: downstream.unwrap_or(self.config.flow.downstream_depth),
        };
        let context = self.dependency_context(&base, &with, params)?;

        let text = if json {
            serde_json::to_string_pretty(&context)?
        } else {
            format_context(&context)
        };
        emit(&text, output.as_deref()).await
    }

    /// Render the call graph of `files` (every discovered file when empty),
    /// or the neighbourhood of one function
    pub async fn graph(
        &mut self,
        files: Vec<PathBuf>,
        function: Option<String>,
        output: Option<PathBuf>,
        json: bool,
    ) -> Result<()> {
        let files = if files.is_empty() { self.parser.discover()? } else { files };
        let (graph, _) = self.build_graph(&files)?;
        info!("Call graph: {}", graph.get_statistics());

        let view = match &function {
            Some(name) => {
                let seed = find_seed(&graph, name)?;
                let params = SubsetParams {
                    upstream_depth: self.config.flow.upstream_depth,
                    downstream_depth: self.config.flow.downstream_depth,
                };
                extract_subset(&graph, seed, params, graph.edges())
            }
            None => graph.full_view(),
        };

        if json {
            let snapshot = GraphSnapshot::new(&graph, &view).to_json()?;
            return emit(&snapshot, output.as_deref()).await;
        }

        let name = match (&function, files.as_slice()) {
            (Some(function), _) => function.replace('.', "_"),
            (None, [only]) => module_token(only).replace('/', "_"),
            (None, _) => "callgraph".to_string(),
        };
        let output_dir = output.unwrap_or_else(|| self.config.project.output_dir.clone());
        let graph_file = output_dir.join("graphs").join(format!("{}.gv", name));

        let renderer = GraphRenderer::new(&self.config.render);
        match renderer.render(&graph, &view, &graph_file).await {
            Ok(RenderOutcome::Empty) => info!("No calls to draw"),
            Ok(RenderOutcome::DotOnly { graph_file }) => println!("{}", graph_file.display()),
            Ok(RenderOutcome::Rendered { image_file, .. }) => println!("{}", image_file.display()),
            Err(FlowdocError::RenderToolMissing { tool }) => {
                warn!("Graphviz ('{}') is not installed; no graph was written", tool);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Print a skeleton of a file
    pub async fn structure(&mut self, file: PathBuf) -> Result<()> {
        let module = self.parser.parse_file(&file)?;
        let options = StructureOptions {
            strip_imports: self.config.flow.strip_imports,
            strip_globals: self.config.flow.strip_globals,
            keep_docstrings: true,
            ..Default::default()
        };
        print!("{}", module.structure(&options));
        Ok(())
    }

    /// Print the project files a file depends on
    pub async fn deps(&mut self, file: PathBuf) -> Result<()> {
        for dep in self.module_deps(&file)? {
            println!("{}", dep.display());
        }
        Ok(())
    }
}

/// The single node a name refers to
fn find_seed(graph: &CallGraph, name: &str) -> Result<NodeId, FlowdocError> {
    match graph.find_nodes(name).as_slice() {
        [] => Err(FlowdocError::UnknownNode(name.to_string())),
        [only] => Ok(*only),
        many => Err(FlowdocError::AmbiguousNode {
            token: name.to_string(),
            candidates: many.iter().map(|&node| graph.display_name(node)).collect(),
        }),
    }
}

fn format_context(context: &DependencyContext) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Execution flow of {}\n\n", context.base.display()));
    if context.execution_flow.is_empty() {
        out.push_str("(no cross-file flow)\n");
    } else {
        out.push_str(&context.execution_flow);
    }

    if !context.call_tree.is_empty() {
        out.push_str("\n# Call tree\n\n");
        out.push_str(&context.call_tree);
    }

    if !context.skipped.is_empty() {
        out.push_str("\n# Skipped files\n\n");
        for failure in &context.skipped {
            out.push_str(&format!("{}: {}\n", failure.path.display(), failure.message));
        }
    }

    out.push_str(&format!("\n# {}\n\n", context.base.display()));
    out.push_str(&context.base_code);

    if !context.deps_code.is_empty() {
        out.push_str("\n# Dependencies");
        out.push_str(&context.deps_code);
        out.push('\n');
    }
    out
}

async fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
