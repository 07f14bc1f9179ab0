//! Deployment records as seen by the reconciler.
//!
//! [`RemoteDeployment`] is the normalized form of a deployment stored on the
//! control plane; [`DeploymentPush`] is what gets sent back. Both are built
//! from, and projected back onto, the locally declared [`DeploymentSpec`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::config::{DeploymentSpec, Schedule, SourceConfig, ValueMap};

use super::types::{DeploymentCreate, DeploymentResponse, DeploymentScheduleCreate};

/// Pull step that clones the flow repository on the worker.
pub const GIT_CLONE_STEP: &str = "prefect.deployments.steps.git_clone";

/// Fully qualified deployment name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeploymentName {
    /// Flow name.
    pub flow: String,
    /// Deployment name within the flow.
    pub deployment: String,
}

impl DeploymentName {
    /// Creates a deployment name.
    #[must_use]
    pub fn new(flow: impl Into<String>, deployment: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            deployment: deployment.into(),
        }
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.flow, self.deployment)
    }
}

/// A deployment record stored on the control plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteDeployment {
    /// Deployment id; nil for records that were never pushed.
    pub id: Uuid,
    /// Owning flow id; nil for records that were never pushed.
    pub flow_id: Uuid,
    /// Deployment name.
    pub name: String,
    /// Version label.
    pub version: Option<String>,
    /// Description text.
    pub description: Option<String>,
    /// Work queue name.
    pub work_queue_name: Option<String>,
    /// Work pool name.
    pub work_pool_name: Option<String>,
    /// Job variables.
    pub job_variables: ValueMap,
    /// Default parameters.
    pub parameters: ValueMap,
    /// Schedules in server order.
    pub schedules: Vec<Schedule>,
    /// Tags.
    pub tags: Vec<String>,
    /// Flow entrypoint.
    pub entrypoint: Option<String>,
    /// Last update time.
    pub updated: Option<DateTime<Utc>>,
}

impl From<DeploymentResponse> for RemoteDeployment {
    fn from(response: DeploymentResponse) -> Self {
        Self {
            id: response.id,
            flow_id: response.flow_id,
            name: response.name,
            version: response.version,
            description: response.description,
            work_queue_name: response.work_queue_name,
            work_pool_name: response.work_pool_name,
            job_variables: response.job_variables.unwrap_or_default(),
            parameters: response.parameters.unwrap_or_default(),
            schedules: response
                .schedules
                .into_iter()
                .map(|s| Schedule {
                    active: s.active,
                    rule: s.schedule,
                })
                .collect(),
            tags: response.tags,
            entrypoint: response.entrypoint,
            updated: response.updated,
        }
    }
}

impl RemoteDeployment {
    /// Projects the record onto the local declaration shape.
    #[must_use]
    pub fn to_spec(&self) -> DeploymentSpec {
        DeploymentSpec {
            name: self.name.clone(),
            version: self.version.clone().unwrap_or_default(),
            work_queue_name: self
                .work_queue_name
                .clone()
                .unwrap_or_else(|| String::from("default")),
            job_variables: Some(self.job_variables.clone()),
            parameters: self.parameters.clone(),
            description: self.description.clone(),
            description_file: None,
            schedules: self.schedules.clone(),
            tags: self.tags.clone(),
        }
    }
}

impl DeploymentSpec {
    /// Builds the record this declaration would produce once pushed.
    #[must_use]
    pub fn to_record(&self, entrypoint: &str, work_pool: &str) -> RemoteDeployment {
        RemoteDeployment {
            id: Uuid::nil(),
            flow_id: Uuid::nil(),
            name: self.name.clone(),
            version: Some(self.version.clone()),
            description: self.description.clone(),
            work_queue_name: Some(self.work_queue_name.clone()),
            work_pool_name: Some(work_pool.to_string()),
            job_variables: self.job_variables.clone().unwrap_or_default(),
            parameters: self.parameters.clone(),
            schedules: self.schedules.clone(),
            tags: self.tags.clone(),
            entrypoint: Some(entrypoint.to_string()),
            updated: None,
        }
    }
}

/// A merged deployment ready to be pushed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentPush {
    /// Merged declaration.
    pub spec: DeploymentSpec,
    /// Resolved entrypoint.
    pub entrypoint: String,
    /// Target work pool.
    pub work_pool: String,
    /// Pull steps for the worker.
    pub pull_steps: Vec<serde_json::Value>,
}

impl DeploymentPush {
    /// Creates a push for a merged declaration.
    #[must_use]
    pub fn new(spec: DeploymentSpec, entrypoint: impl Into<String>, work_pool: impl Into<String>) -> Self {
        Self {
            spec,
            entrypoint: entrypoint.into(),
            work_pool: work_pool.into(),
            pull_steps: Vec::new(),
        }
    }

    /// Adds a git clone pull step for the given source.
    #[must_use]
    pub fn with_source(mut self, source: Option<&SourceConfig>) -> Self {
        self.pull_steps = source.map(git_clone_step).into_iter().collect();
        self
    }

    /// Builds the API body for the given flow id.
    #[must_use]
    pub fn to_create(&self, flow_id: Uuid) -> DeploymentCreate {
        DeploymentCreate {
            name: self.spec.name.clone(),
            flow_id,
            version: self.spec.version.clone(),
            description: self.spec.description.clone(),
            work_queue_name: self.spec.work_queue_name.clone(),
            work_pool_name: self.work_pool.clone(),
            job_variables: self.spec.job_variables.clone().unwrap_or_default(),
            parameters: self.spec.parameters.clone(),
            schedules: self
                .spec
                .schedules
                .iter()
                .map(|s| DeploymentScheduleCreate {
                    active: s.active,
                    schedule: s.rule.clone(),
                })
                .collect(),
            tags: self.spec.tags.clone(),
            entrypoint: self.entrypoint.clone(),
            pull_steps: self.pull_steps.clone(),
        }
    }
}

/// Builds the `git_clone` pull step for a source.
#[must_use]
pub fn git_clone_step(source: &SourceConfig) -> serde_json::Value {
    let mut step = serde_json::Map::new();
    step.insert(String::from("repository"), source.url.clone().into());
    if let Some(branch) = &source.branch {
        step.insert(String::from("branch"), branch.clone().into());
    }
    if let Some(block) = &source.access_token_block {
        step.insert(
            String::from("access_token"),
            format!("{{{{ prefect.blocks.secret.{block} }}}}").into(),
        );
    }

    serde_json::json!({ GIT_CLONE_STEP: step })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleRule;
    use crate::prefect::types::DeploymentScheduleResponse;

    fn spec() -> DeploymentSpec {
        DeploymentSpec {
            name: String::from("nightly"),
            version: String::from("1.0.0"),
            work_queue_name: String::from("default"),
            job_variables: None,
            parameters: ValueMap::from([(String::from("dir"), serde_json::json!("/data"))]),
            description: Some(String::from("Nightly run")),
            description_file: None,
            schedules: vec![Schedule::active(ScheduleRule::cron("0 2 * * *", None))],
            tags: vec![String::from("etl")],
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(DeploymentName::new("etl", "nightly").to_string(), "etl/nightly");
    }

    #[test]
    fn test_response_conversion_keeps_schedule_flags() {
        let response = DeploymentResponse {
            id: Uuid::new_v4(),
            flow_id: Uuid::new_v4(),
            name: String::from("nightly"),
            version: None,
            description: None,
            work_queue_name: None,
            work_pool_name: None,
            job_variables: None,
            parameters: None,
            schedules: vec![DeploymentScheduleResponse {
                id: None,
                active: false,
                schedule: ScheduleRule::interval(60.0),
            }],
            tags: vec![],
            entrypoint: None,
            updated: None,
        };

        let record = RemoteDeployment::from(response);
        assert!(record.parameters.is_empty());
        assert_eq!(record.schedules, vec![Schedule::inactive(ScheduleRule::interval(60.0))]);

        let projected = record.to_spec();
        assert_eq!(projected.work_queue_name, "default");
        assert_eq!(projected.version, "");
    }

    #[test]
    fn test_spec_round_trips_through_record() {
        let record = spec().to_record("flows/etl/flow.py:main", "pool");
        assert_eq!(record.entrypoint.as_deref(), Some("flows/etl/flow.py:main"));
        let back = record.to_spec();
        assert_eq!(back.parameters, spec().parameters);
        assert_eq!(back.schedules, spec().schedules);
        assert_eq!(back.tags, spec().tags);
    }

    #[test]
    fn test_git_clone_step_with_token_block() {
        let source = SourceConfig {
            url: String::from("https://github.com/org/flows.git"),
            branch: Some(String::from("main")),
            access_token_block: Some(String::from("github-token")),
        };
        let push = DeploymentPush::new(spec(), "flow.py:main", "pool").with_source(Some(&source));
        let step = &push.pull_steps[0][GIT_CLONE_STEP];
        assert_eq!(step["repository"], "https://github.com/org/flows.git");
        assert_eq!(step["branch"], "main");
        assert_eq!(step["access_token"], "{{ prefect.blocks.secret.github-token }}");
    }

    #[test]
    fn test_create_body_carries_merged_fields() {
        let flow_id = Uuid::new_v4();
        let body = DeploymentPush::new(spec(), "flow.py:main", "pool").to_create(flow_id);
        assert_eq!(body.flow_id, flow_id);
        assert_eq!(body.work_pool_name, "pool");
        assert_eq!(body.schedules.len(), 1);
        assert!(body.pull_steps.is_empty());
        assert!(body.job_variables.is_empty());
    }
}
