//! Prefect API wire types.
//!
//! This module defines the JSON bodies exchanged with the Prefect REST API.
//! Fields the reconciler never reads are not modelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ScheduleRule, ValueMap};

/// A deployment as returned by `GET /deployments/name/{flow}/{deployment}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResponse {
    /// Deployment id.
    pub id: Uuid,
    /// Owning flow id.
    pub flow_id: Uuid,
    /// Deployment name.
    pub name: String,
    /// Version label.
    #[serde(default)]
    pub version: Option<String>,
    /// Description text.
    #[serde(default)]
    pub description: Option<String>,
    /// Work queue name.
    #[serde(default)]
    pub work_queue_name: Option<String>,
    /// Work pool name.
    #[serde(default)]
    pub work_pool_name: Option<String>,
    /// Job variables (`infra_overrides` on older servers).
    #[serde(default, alias = "infra_overrides")]
    pub job_variables: Option<ValueMap>,
    /// Default parameters.
    #[serde(default)]
    pub parameters: Option<ValueMap>,
    /// Attached schedules.
    #[serde(default)]
    pub schedules: Vec<DeploymentScheduleResponse>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Flow entrypoint.
    #[serde(default)]
    pub entrypoint: Option<String>,
    /// Last update time.
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

/// A schedule attached to a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentScheduleResponse {
    /// Schedule id.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Whether the schedule is active.
    #[serde(default = "default_active")]
    pub active: bool,
    /// The schedule rule.
    pub schedule: ScheduleRule,
}

/// A schedule in a deployment create/update body.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentScheduleCreate {
    /// Whether the schedule is active.
    pub active: bool,
    /// The schedule rule.
    pub schedule: ScheduleRule,
}

/// Body of `POST /deployments/`, which upserts by flow id and name.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentCreate {
    /// Deployment name.
    pub name: String,
    /// Owning flow id.
    pub flow_id: Uuid,
    /// Version label.
    pub version: String,
    /// Description text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Work queue name.
    pub work_queue_name: String,
    /// Work pool name.
    pub work_pool_name: String,
    /// Job variables.
    pub job_variables: ValueMap,
    /// Default parameters.
    pub parameters: ValueMap,
    /// Schedules.
    pub schedules: Vec<DeploymentScheduleCreate>,
    /// Tags.
    pub tags: Vec<String>,
    /// Flow entrypoint.
    pub entrypoint: String,
    /// Steps the worker runs to fetch flow code.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pull_steps: Vec<serde_json::Value>,
}

/// Body of `POST /flows/`.
#[derive(Debug, Clone, Serialize)]
pub struct FlowCreate {
    /// Flow name.
    pub name: String,
}

/// Response of `POST /flows/`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowResponse {
    /// Flow id.
    pub id: Uuid,
    /// Flow name.
    pub name: String,
}

/// Minimal response carrying only an id.
#[derive(Debug, Clone, Deserialize)]
pub struct IdResponse {
    /// Object id.
    pub id: Uuid,
}

const fn default_active() -> bool {
    true
}
