//! Configuration validation for deploy files.
//!
//! This module checks a parsed deploy file for values the control plane would
//! reject or that make the reconciliation ambiguous.

use crate::error::{ConfigError, FlowdeployError, Result};
use crate::planner::{CronError, CronExpression};
use std::collections::HashSet;
use tracing::debug;

use super::entrypoint::EntrypointSource;
use super::spec::{DeployConfig, DeploymentSpec, ScheduleRule};

/// Validator for deploy files.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a deploy file.
    ///
    /// # Errors
    ///
    /// Returns the entrypoint error if the entrypoint forms are inconsistent,
    /// otherwise the first validation error found.
    pub fn validate(&self, config: &DeployConfig) -> Result<ValidationResult> {
        EntrypointSource::from_config(config)?;

        let mut result = ValidationResult::default();

        if config.flow.name.trim().is_empty() {
            result.error("flow.name", "Flow name cannot be empty");
        }
        if config.work_pool.trim().is_empty() {
            result.error("work_pool", "Work pool name cannot be empty");
        }
        if let Some(source) = &config.source
            && source.url.trim().is_empty()
        {
            result.error("source.url", "Source URL cannot be empty");
        }

        if config.deployments.is_empty() {
            result.error("deployments", "At least one deployment must be declared");
        }

        let mut seen = HashSet::new();
        for (index, deployment) in config.deployments.iter().enumerate() {
            if !seen.insert(deployment.name.as_str()) {
                return Err(FlowdeployError::Config(ConfigError::DuplicateName {
                    name: deployment.name.clone(),
                }));
            }
            Self::validate_deployment(index, deployment, &mut result);
        }

        if let Some(first_error) = result.errors.first() {
            return Err(FlowdeployError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!("Deploy file validation passed");
        Ok(result)
    }

    /// Validates a single deployment.
    fn validate_deployment(index: usize, deployment: &DeploymentSpec, result: &mut ValidationResult) {
        let prefix = format!("deployments[{index}]");

        if deployment.name.trim().is_empty() {
            result.error(format!("{prefix}.name"), "Deployment name cannot be empty");
        } else if deployment.name.contains('/') {
            result.error(
                format!("{prefix}.name"),
                format!("Deployment name '{}' cannot contain '/'", deployment.name),
            );
        }

        if deployment.version.trim().is_empty() {
            result.error(format!("{prefix}.version"), "Version cannot be empty");
        }

        if deployment.work_queue_name.trim().is_empty() {
            result.error(format!("{prefix}.work_queue_name"), "Work queue name cannot be empty");
        }

        if deployment.description_file.is_some() && deployment.description.is_some() {
            result.warnings.push(format!(
                "{prefix}: both description and description_file are set; description wins"
            ));
        }

        for (i, schedule) in deployment.schedules.iter().enumerate() {
            let field = format!("{prefix}.schedules[{i}]");
            match &schedule.rule {
                ScheduleRule::Cron(rule) => match CronExpression::parse(&rule.cron) {
                    Ok(_) => {}
                    Err(CronError::Invalid(message)) => result.error(field, message),
                    Err(CronError::Unsupported(message)) => result.warnings.push(format!(
                        "{field}: {message}; the schedule is pushed without a description"
                    )),
                },
                ScheduleRule::Interval(rule) => {
                    if !(rule.interval.is_finite() && rule.interval > 0.0) {
                        result.error(field, "Interval must be a positive number of seconds");
                    }
                }
                ScheduleRule::RRule(rule) => {
                    if rule.rrule.trim().is_empty() {
                        result.error(field, "Recurrence rule cannot be empty");
                    }
                }
            }
        }

        let mut tags = HashSet::new();
        for tag in &deployment.tags {
            if !tags.insert(tag.as_str()) {
                result
                    .warnings
                    .push(format!("{prefix}: tag '{tag}' is declared more than once"));
            }
        }
    }
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if no errors were recorded.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
