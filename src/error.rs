use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Flowdoc operations
#[derive(Error, Debug)]
pub enum FlowdocError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("No definition named '{0}' in the call graph")]
    UnknownNode(String),

    #[error("Definition name '{token}' is ambiguous, candidates: {}", candidates.join(", "))]
    AmbiguousNode { token: String, candidates: Vec<String> },

    #[error("Graph rasterizer '{tool}' was not found, install Graphviz to render graphs")]
    RenderToolMissing { tool: String },
}

impl FlowdocError {
    /// Build a parse error carrying the offending path
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowdocError>;
