//! Language-specific parsers
//!
//! Each language gets its own module that turns source text into the shared
//! [`SourceModule`] model.

mod python;

pub use python::PythonParser;

use crate::error::Result;
use super::source::SourceModule;

/// Trait that all language parsers must implement
pub trait LanguageParser {
    /// Parse source code into a source model, failing on invalid syntax
    fn parse(&mut self, content: &str, file_path: &std::path::Path) -> Result<SourceModule>;

    /// Get the file extensions this parser handles
    fn file_extensions(&self) -> &[&str];

    /// Get the language name
    fn language_name(&self) -> &str;
}
