//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: classify the instance and apply its pipeline
//! - plan: show the steps that would run
//! - classify: print the detected environment

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// PostClone - configure a freshly cloned instance for its environment
#[derive(Parser, Debug)]
#[command(name = "postclone")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Record store directory (overrides storage.path)
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute (defaults to run)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Classify the instance and apply its configuration pipeline
    Run,

    /// Show the pipeline for this instance without changing anything
    Plan,

    /// Print the detected environment
    Classify,
}
