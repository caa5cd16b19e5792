use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::core::Engine;

#[derive(Parser)]
#[command(name = "flowdoc")]
#[command(about = "Cross-file call graphs and execution flows for Python code")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base directory that file arguments are relative to
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default Flowdoc.toml
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Execution flow and pruned sources for a base module
    Flow {
        /// Module to describe
        base: PathBuf,

        /// Files to analyse with it (defaults to the project files it imports)
        #[arg(short, long = "with")]
        with: Vec<PathBuf>,

        /// Caller hops to follow from each seed
        #[arg(long)]
        upstream: Option<usize>,

        /// Callee hops to follow from each seed
        #[arg(long)]
        downstream: Option<usize>,

        /// Print the context as JSON
        #[arg(long)]
        json: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the call graph with Graphviz
    Graph {
        /// Files to include (defaults to every discovered file)
        files: Vec<PathBuf>,

        /// Only draw the neighbourhood of this function (`name` or `Class.method`)
        #[arg(short, long)]
        function: Option<String>,

        /// Output directory for graphs, or output file with --json
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dump the graph as JSON instead of rendering it
        #[arg(long)]
        json: bool,
    },

    /// Print a skeleton of a module with bodies elided
    Structure {
        file: PathBuf,
    },

    /// List the project files a module imports
    Deps {
        file: PathBuf,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path } => {
                engine.init(path).await
            }
            Commands::Flow { base, with, upstream, downstream, json, output } => {
                engine.flow(base, with, upstream, downstream, json, output).await
            }
            Commands::Graph { files, function, output, json } => {
                engine.graph(files, function, output, json).await
            }
            Commands::Structure { file } => {
                engine.structure(file).await
            }
            Commands::Deps { file } => {
                engine.deps(file).await
            }
        }
    }
}
