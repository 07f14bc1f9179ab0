//! Configuration specification types for the deploy file.
//!
//! This module defines the structs that map to `flowdeploy.yaml`. They describe
//! the locally declared desired state of one flow's deployments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form JSON-like mapping used for parameters and job variables.
pub type ValueMap = BTreeMap<String, serde_json::Value>;

/// The root configuration structure for a deploy file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployConfig {
    /// Flow being deployed.
    pub flow: FlowConfig,
    /// Explicit entrypoint (`path/to/flow.py:function`).
    #[serde(default)]
    pub entrypoint: Option<String>,
    /// Work pool every deployment is pushed to.
    pub work_pool: String,
    /// Git source the control plane pulls the flow code from.
    #[serde(default)]
    pub source: Option<SourceConfig>,
    /// Declared deployments.
    pub deployments: Vec<DeploymentSpec>,
}

/// Flow identity and the derived entrypoint form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlowConfig {
    /// Flow name as registered with the control plane.
    pub name: String,
    /// Flow module file, relative to the deploy file directory.
    #[serde(default)]
    pub module: Option<String>,
    /// Flow callable inside the module.
    #[serde(default)]
    pub function: Option<String>,
}

/// Git source configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Repository clone URL.
    pub url: String,
    /// Branch to pull.
    #[serde(default)]
    pub branch: Option<String>,
    /// Name of a secret block holding an access token.
    #[serde(default)]
    pub access_token_block: Option<String>,
}

/// A single locally declared deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentSpec {
    /// Deployment name, unique within the flow.
    pub name: String,
    /// Deployment version label.
    pub version: String,
    /// Work queue within the work pool.
    #[serde(default = "default_work_queue")]
    pub work_queue_name: String,
    /// Infrastructure overrides for the work pool.
    #[serde(default)]
    pub job_variables: Option<ValueMap>,
    /// Default flow parameters.
    #[serde(default)]
    pub parameters: ValueMap,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// File holding the description, relative to the deploy file.
    #[serde(default, skip_serializing)]
    pub description_file: Option<String>,
    /// Schedules in declaration order.
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    /// Tags; treated as a set when diffing.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A schedule together with its active flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    /// Whether the schedule produces runs.
    #[serde(default = "default_active")]
    pub active: bool,
    /// The schedule rule.
    #[serde(flatten)]
    pub rule: ScheduleRule,
}

/// One of the schedule rule kinds the control plane understands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScheduleRule {
    /// Cron expression.
    Cron(CronRule),
    /// Fixed interval.
    Interval(IntervalRule),
    /// iCalendar recurrence rule.
    RRule(RRuleRule),
}

/// Cron schedule rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CronRule {
    /// Five-field cron expression.
    pub cron: String,
    /// IANA timezone name.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Whether day-of-month and day-of-week are OR-ed.
    #[serde(default = "default_day_or")]
    pub day_or: bool,
}

/// Interval schedule rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntervalRule {
    /// Interval length in seconds.
    pub interval: f64,
    /// Anchor the intervals are counted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_date: Option<DateTime<Utc>>,
    /// IANA timezone name.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Recurrence rule schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RRuleRule {
    /// RFC 5545 recurrence rule.
    pub rrule: String,
    /// IANA timezone name.
    #[serde(default)]
    pub timezone: Option<String>,
}

fn default_work_queue() -> String {
    String::from("default")
}

const fn default_active() -> bool {
    true
}

const fn default_day_or() -> bool {
    true
}

impl DeployConfig {
    /// Returns deployment names.
    #[must_use]
    pub fn deployment_names(&self) -> Vec<&str> {
        self.deployments.iter().map(|d| d.name.as_str()).collect()
    }
}

impl Schedule {
    /// Creates an active schedule.
    #[must_use]
    pub const fn active(rule: ScheduleRule) -> Self {
        Self { active: true, rule }
    }

    /// Creates an inactive schedule.
    #[must_use]
    pub const fn inactive(rule: ScheduleRule) -> Self {
        Self { active: false, rule }
    }
}

impl ScheduleRule {
    /// Creates a cron rule.
    #[must_use]
    pub fn cron(expression: impl Into<String>, timezone: Option<&str>) -> Self {
        Self::Cron(CronRule {
            cron: expression.into(),
            timezone: timezone.map(String::from),
            day_or: true,
        })
    }

    /// Creates an interval rule.
    #[must_use]
    pub const fn interval(seconds: f64) -> Self {
        Self::Interval(IntervalRule {
            interval: seconds,
            anchor_date: None,
            timezone: None,
        })
    }

    /// Creates a recurrence rule.
    #[must_use]
    pub fn rrule(rule: impl Into<String>) -> Self {
        Self::RRule(RRuleRule {
            rrule: rule.into(),
            timezone: None,
        })
    }

    /// Returns the cron expression for cron rules.
    #[must_use]
    pub fn cron_expression(&self) -> Option<&str> {
        match self {
            Self::Cron(rule) => Some(rule.cron.as_str()),
            Self::Interval(_) | Self::RRule(_) => None,
        }
    }
}

impl fmt::Display for ScheduleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cron(rule) => {
                write!(f, "cron='{}'", rule.cron)?;
                if let Some(tz) = &rule.timezone {
                    write!(f, " timezone='{tz}'")?;
                }
                if !rule.day_or {
                    write!(f, " day_or=False")?;
                }
                Ok(())
            }
            Self::Interval(rule) => {
                write!(f, "interval={}s", rule.interval)?;
                if let Some(anchor) = &rule.anchor_date {
                    write!(f, " anchor_date='{}'", anchor.to_rfc3339())?;
                }
                if let Some(tz) = &rule.timezone {
                    write!(f, " timezone='{tz}'")?;
                }
                Ok(())
            }
            Self::RRule(rule) => {
                write!(f, "rrule='{}'", rule.rrule)?;
                if let Some(tz) = &rule.timezone {
                    write!(f, " timezone='{tz}'")?;
                }
                Ok(())
            }
        }
    }
}
