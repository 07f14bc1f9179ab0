//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::planner::{MergeField, MergeOptions};

/// Flowdeploy - Push Prefect deployments and report what changed.
///
/// By default parameters, schedules, and tags are not updated: the values
/// already stored on the server are kept. Pass the matching flag to push the
/// locally declared values instead.
#[derive(Parser, Debug)]
#[command(name = "flowdeploy")]
#[command(author, version, about, long_about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Push the declared parameters.
    #[arg(short, long, global = true)]
    pub parameters: bool,

    /// Push the declared schedules.
    #[arg(short, long, global = true, alias = "schedule")]
    pub schedules: bool,

    /// Push the declared tags.
    #[arg(short, long, global = true)]
    pub tags: bool,

    /// Push declared parameters, schedules, and tags.
    #[arg(short = 'a', long, global = true)]
    pub update_all: bool,

    /// Path to the deploy file.
    #[arg(short, long, global = true, env = "FLOWDEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute; defaults to `deploy`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Push every declared deployment and show the changes.
    Deploy,

    /// Show what a deploy would change without pushing.
    Diff,

    /// Validate the deploy file and resolve the entrypoint.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Returns the subcommand, defaulting to `deploy`.
    #[must_use]
    pub fn command_or_default(&self) -> Commands {
        self.command.unwrap_or(Commands::Deploy)
    }

    /// Returns the fields whose local values are pushed.
    #[must_use]
    pub fn merge_options(&self) -> MergeOptions {
        if self.update_all {
            return MergeOptions::all();
        }

        [
            (self.parameters, MergeField::Parameters),
            (self.schedules, MergeField::Schedules),
            (self.tags, MergeField::Tags),
        ]
        .into_iter()
        .filter_map(|(set, field)| set.then_some(field))
        .collect()
    }
}
