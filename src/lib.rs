//! Flowdoc: cross-file call graphs and execution flows for Python code
//!
//! Source files are parsed into a [`core::SourceModule`] model, linked into a
//! [`core::CallGraph`], and queried for the execution flow around the
//! definitions of a base file. The same graph drives pruning of the sources
//! down to the definitions that flow touches.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;

pub use error::{FlowdocError, Result};
