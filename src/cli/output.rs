//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying deployment
//! reports to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::config::{DeployConfig, ValidationResult};
use crate::planner::{Change, DeploymentReport, ParameterDiff, ScheduleRow, TagDiff};
use crate::reconciler::{DeployOutcome, DeploymentResult};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the outcome of a deploy run.
    #[must_use]
    pub fn format_outcome(&self, outcome: &DeployOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => match outcome {
                DeployOutcome::DirtyWorkingTree { entries } => Self::format_dirty_text(entries),
                DeployOutcome::Deployed { results } => Self::format_results_text(results),
            },
        }
    }

    /// Formats preview results.
    #[must_use]
    pub fn format_preview(&self, results: &[DeploymentResult]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(results).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{}\n", "Preview: nothing has been pushed".dimmed());
                output.push_str(&Self::format_results_text(results));
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &DeployConfig,
        result: &ValidationResult,
        entrypoint: &str,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "flow": config.flow.name,
                    "entrypoint": entrypoint,
                    "work_pool": config.work_pool,
                    "deployments": config.deployment_names(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Deploy file is valid!\n", "✓".green());
                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nDeploy file summary:\n");
                let _ = writeln!(output, "   Flow: {}", config.flow.name);
                let _ = writeln!(output, "   Entrypoint: {entrypoint}");
                let _ = writeln!(output, "   Work pool: {}", config.work_pool);
                let _ = writeln!(
                    output,
                    "   Deployments: {}",
                    config.deployment_names().join(", ")
                );
                output
            }
        }
    }

    /// Formats the dirty working tree warning.
    fn format_dirty_text(entries: &[String]) -> String {
        let mut output = format!(
            "{} The working tree has uncommitted or untracked changes; nothing was pushed.\n",
            "⚠".yellow()
        );
        output.push_str("   Commit and push them first so the server pulls the same code:\n");
        for entry in entries {
            let _ = writeln!(output, "   {entry}");
        }
        output
    }

    /// Formats per-deployment results as text.
    fn format_results_text(results: &[DeploymentResult]) -> String {
        let mut output = String::new();
        for result in results {
            let _ = writeln!(output, "{}", "─".repeat(60).dimmed());
            match &result.report {
                Some(report) => {
                    let _ = writeln!(output, "🚀 {}", result.name.to_string().bright_cyan().bold());
                    output.push_str(&Self::format_report_text(report));
                }
                None => {
                    let _ = writeln!(
                        output,
                        "{} {}: the deployment could not be read back. Make sure every change is committed and pushed to the remote branch.",
                        "⚠".yellow(),
                        result.name
                    );
                }
            }
        }
        output
    }

    /// Formats a single report as a tree.
    #[must_use]
    pub fn format_report_text(report: &DeploymentReport) -> String {
        let mut output = String::new();

        let entrypoint = match &report.entrypoint.previous {
            None => format!("`{}`", report.entrypoint.current).bold().to_string(),
            Some(previous) => format!(
                "{} {}",
                format!("`{}`", report.entrypoint.current).green(),
                format!("`{previous}`").red().strikethrough()
            ),
        };
        let _ = writeln!(output, "├── {} {entrypoint}", "entrypoint:".blue().bold());
        let _ = writeln!(output, "├── {} {}", "tags:".blue().bold(), Self::format_tags(&report.tags));

        let _ = writeln!(output, "├── {}", "schedules:".blue().bold());
        let count = report.schedules.len();
        for (i, row) in report.schedules.iter().enumerate() {
            let branch = if i + 1 == count { "└──" } else { "├──" };
            let _ = writeln!(output, "│   {branch} {}", Self::format_schedule(row));
        }

        let _ = writeln!(output, "└── {}", "parameters:".blue().bold());
        for line in Self::format_parameters(&report.parameters).lines() {
            let _ = writeln!(output, "    {line}");
        }

        output
    }

    /// Formats tags sorted by name; added in green, removed struck through.
    fn format_tags(tags: &TagDiff) -> String {
        let mut all: Vec<(&String, Change)> = tags
            .unchanged
            .iter()
            .map(|t| (t, Change::Unchanged))
            .chain(tags.added.iter().map(|t| (t, Change::Added)))
            .chain(tags.removed.iter().map(|t| (t, Change::Removed)))
            .collect();
        all.sort();

        all.into_iter()
            .map(|(tag, change)| {
                let text = format!("({tag})");
                match change {
                    Change::Added => text.green().to_string(),
                    Change::Removed => text.red().strikethrough().to_string(),
                    Change::Modified | Change::Unchanged => text,
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Formats a schedule row.
    fn format_schedule(row: &ScheduleRow) -> String {
        let state = if row.active {
            "Active".green().to_string()
        } else {
            "Inactive".red().to_string()
        };
        let rule = row.rule.to_string();
        let rule = match row.change {
            Change::Added => rule.green().to_string(),
            Change::Removed => rule.red().strikethrough().to_string(),
            Change::Modified | Change::Unchanged => rule,
        };

        let mut line = format!("{state} {} {rule}", "->".bright_cyan().bold());
        if let Some(description) = &row.description {
            let _ = write!(line, " ({})", description.dimmed());
        }
        line
    }

    /// Formats the parameters table; the old value column only appears when
    /// something changed.
    fn format_parameters(parameters: &ParameterDiff) -> String {
        if parameters.rows.is_empty() {
            return String::from("(none)");
        }

        let mut builder = Builder::default();
        if parameters.changed {
            builder.push_record(["Parameters", "Value", "Old Value"]);
        } else {
            builder.push_record(["Parameters", "Value"]);
        }

        for row in &parameters.rows {
            let key = match row.change {
                Change::Added => format!("+ {} ★", row.key),
                Change::Removed => format!("- {} ★", row.key),
                Change::Modified => format!("~ {} ★", row.key),
                Change::Unchanged => row.key.clone(),
            };
            if parameters.changed {
                let old = row.old_value.clone().unwrap_or_default();
                builder.push_record([key, row.value.clone(), old]);
            } else {
                builder.push_record([key, row.value.clone()]);
            }
        }

        let mut table = builder.build();
        table.with(Style::rounded());
        table.to_string()
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", "✓".green().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", "⚠".yellow().to_string(), message)
    }

    fn message(&self, status: &str, icon: String, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{icon} {message}"),
        }
    }
}
