use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FlowdocError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Source code parsing configuration
    pub parsing: ParsingConfig,

    /// Execution flow extraction settings
    pub flow: FlowConfig,

    /// Graph rendering settings
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Directory that file paths are relative to
    pub base_dir: PathBuf,

    /// File name patterns to include when discovering sources
    pub include_patterns: Vec<String>,

    /// File and directory name patterns to skip
    pub exclude_patterns: Vec<String>,

    /// Honour .gitignore files while discovering sources
    pub respect_gitignore: bool,

    /// Output directory for graphs and extracted context
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// Languages to support
    pub languages: Vec<String>,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,

    /// Abort on the first file that fails to parse
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Hops followed towards callers of a seed
    pub upstream_depth: usize,

    /// Hops followed towards callees of a seed
    pub downstream_depth: usize,

    /// Drop import statements from pruned sources
    pub strip_imports: bool,

    /// Drop top-level statements that are not definitions or imports
    pub strip_globals: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Whether `graph` rasterizes the DOT output
    pub enabled: bool,

    /// Graphviz binary used for rasterization
    pub dot_binary: String,

    /// Image format passed to Graphviz (png, svg, ...)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                name: "Unnamed Project".to_string(),
                base_dir: PathBuf::from("."),
                include_patterns: vec!["*.py".to_string()],
                exclude_patterns: vec![".*".to_string(), "__*".to_string()],
                respect_gitignore: false,
                output_dir: PathBuf::from("docs"),
            },
            parsing: ParsingConfig {
                languages: vec!["python".to_string()],
                max_file_size: 1024 * 1024, // 1MB
                fail_fast: false,
            },
            flow: FlowConfig {
                upstream_depth: 2,
                downstream_depth: 2,
                strip_imports: false,
                strip_globals: true,
            },
            render: RenderConfig {
                enabled: true,
                dot_binary: "dot".to_string(),
                format: "png".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| FlowdocError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FlowdocError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "Flowdoc.toml",
                    "flowdoc.toml",
                    ".flowdoc.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.project.include_patterns.is_empty() {
            return Err(FlowdocError::Config(
                "project.include_patterns must not be empty".to_string(),
            ));
        }
        if self.render.dot_binary.trim().is_empty() {
            return Err(FlowdocError::Config(
                "render.dot_binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
