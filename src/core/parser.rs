use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ParsingConfig, ProjectConfig};
use crate::error::{FlowdocError, Result};
use super::languages::{LanguageParser, PythonParser};
use super::source::SourceModule;

/// A file that could not be turned into a source model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of parsing a batch of files
#[derive(Debug, Default)]
pub struct ParseReport {
    /// Parsed modules, in input order
    pub modules: Vec<SourceModule>,
    /// Files skipped because of parse errors
    pub failures: Vec<ParseFailure>,
}

/// Discovers source files under the base directory and parses them through
/// the language-specific parsers
pub struct CodeParser {
    config: ParsingConfig,
    base_dir: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    respect_gitignore: bool,
    language_parsers: HashMap<String, Box<dyn LanguageParser>>,
}

impl CodeParser {
    pub fn new(project: &ProjectConfig, config: &ParsingConfig) -> Result<Self> {
        let mut language_parsers: HashMap<String, Box<dyn LanguageParser>> = HashMap::new();

        // Initialize language parsers based on configuration
        for language in &config.languages {
            match language.as_str() {
                "python" => {
                    let python_parser = PythonParser::new()?;
                    language_parsers.insert("python".to_string(), Box::new(python_parser));
                }
                other => {
                    warn!("Skipping unsupported language '{}'", other);
                    continue;
                }
            }
        }

        if language_parsers.is_empty() {
            return Err(FlowdocError::Config(
                "No supported language enabled in parsing.languages".to_string(),
            ));
        }

        Ok(Self {
            config: config.clone(),
            base_dir: project.base_dir.clone(),
            include: build_glob_set(&project.include_patterns)?,
            exclude: build_glob_set(&project.exclude_patterns)?,
            respect_gitignore: project.respect_gitignore,
            language_parsers,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Recursively list parseable files, relative to the base directory and
    /// sorted by name
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let exclude = self.exclude.clone();

        let walker = WalkBuilder::new(&self.base_dir)
            .standard_filters(false)
            .git_ignore(self.respect_gitignore)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| entry.depth() == 0 || !exclude.is_match(entry.file_name()))
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| FlowdocError::FileSystem(e.to_string()))?;
            let is_file = entry.file_type().map_or(false, |file_type| file_type.is_file());

            if is_file && self.should_parse_file(entry.path()) {
                paths.push(self.relative_path(entry.path()));
            }
        }

        debug!("Discovered {} source files under {}", paths.len(), self.base_dir.display());
        Ok(paths)
    }

    /// Parse a single source file, `file_path` being relative to the base directory
    pub fn parse_file<P: AsRef<Path>>(&mut self, file_path: P) -> Result<SourceModule> {
        let path = self.relative_path(file_path.as_ref());
        let language = self.detect_language(&path)?;

        let source_content = std::fs::read_to_string(self.base_dir.join(&path))
            .map_err(|e| FlowdocError::parse(&path, e.to_string()))?;

        // Check file size
        if source_content.len() > self.config.max_file_size {
            return Err(FlowdocError::parse(
                &path,
                format!("file exceeds maximum size limit of {} bytes", self.config.max_file_size),
            ));
        }

        let parser = self.language_parsers.get_mut(&language)
            .ok_or_else(|| FlowdocError::parse(&path, format!("no parser for {}", language)))?;
        parser.parse(&source_content, &path)
    }

    /// Parse files in order. Failures are collected unless `fail_fast` is set,
    /// in which case the first one is returned.
    pub fn parse_files(&mut self, paths: &[PathBuf]) -> Result<ParseReport> {
        let mut report = ParseReport::default();

        for path in paths {
            match self.parse_file(path) {
                Ok(module) => report.modules.push(module),
                Err(e) if self.config.fail_fast => return Err(e),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    let message = match e {
                        FlowdocError::Parse { message, .. } => message,
                        other => other.to_string(),
                    };
                    report.failures.push(ParseFailure {
                        path: self.relative_path(path),
                        message,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Determine if a file should be parsed based on configuration
    fn should_parse_file(&self, path: &Path) -> bool {
        let name_matches = path
            .file_name()
            .map_or(false, |name| self.include.is_match(name));
        name_matches && self.detect_language(path).is_ok()
    }

    /// Detect programming language from file path
    fn detect_language(&self, path: &Path) -> Result<String> {
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            for (lang, parser) in &self.language_parsers {
                if parser.file_extensions().contains(&extension) {
                    return Ok(lang.clone());
                }
            }
        }

        Err(FlowdocError::parse(path, "could not detect language"))
    }

    /// Path relative to the base directory, without `.` components
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        let relative = path.strip_prefix(&self.base_dir).unwrap_or(path);
        relative
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect()
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
