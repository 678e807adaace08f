//! CLI module for postclone - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
