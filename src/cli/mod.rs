//! CLI module for the flowdeploy tool.
//!
//! This module provides the command-line interface for pushing Prefect
//! deployments and rendering change reports.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
