//! Planning module for deployment updates.
//!
//! This module decides what gets pushed for each deployment and describes
//! what changed afterwards.

mod cron;
mod diff;
mod merge;

pub use cron::{CronError, CronExpression, describe as describe_cron};
pub use diff::{
    Change, DeploymentReport, EntrypointChange, ParameterDiff, ParameterRow, ScheduleRow, TagDiff,
    diff_parameters, diff_schedules, diff_tags, render_diff, render_value,
};
pub use merge::{MergeField, MergeOptions, merge};
