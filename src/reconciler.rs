//! Reconciler for pushing declared deployments.
//!
//! This module implements the deploy sequence: refuse to run on a dirty
//! working tree, snapshot every remote deployment, merge, push the whole
//! batch, then re-fetch and report what changed against each snapshot.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{DeployConfig, EntrypointSource};
use crate::error::Result;
use crate::planner::{DeploymentReport, MergeOptions, merge, render_diff};
use crate::prefect::{ControlPlane, DeploymentName, DeploymentPush, RemoteDeployment};
use crate::repo::WorkingTree;

/// Reconciler for one deploy file.
pub struct Reconciler<'a, C: ControlPlane, W: WorkingTree> {
    /// Configuration.
    config: &'a DeployConfig,
    /// Directory holding the deploy file.
    config_dir: &'a Path,
    /// Control plane.
    plane: &'a C,
    /// Working tree.
    tree: &'a W,
    /// Fields whose local value is pushed.
    options: MergeOptions,
}

/// Outcome of a deploy run.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeployOutcome {
    /// Nothing was pushed because the working tree has local changes.
    DirtyWorkingTree {
        /// Porcelain status lines.
        entries: Vec<String>,
    },
    /// Every deployment was pushed.
    Deployed {
        /// Per-deployment results in declaration order.
        results: Vec<DeploymentResult>,
    },
}

/// Result for a single deployment.
#[derive(Debug, Serialize)]
pub struct DeploymentResult {
    /// Fully qualified name.
    pub name: DeploymentName,
    /// Change report; `None` if the deployment could not be read back.
    pub report: Option<DeploymentReport>,
}

/// A staged deployment with the remote state it was merged against.
struct Staged {
    name: DeploymentName,
    snapshot: Option<RemoteDeployment>,
    push: DeploymentPush,
}

impl<'a, C: ControlPlane, W: WorkingTree> Reconciler<'a, C, W> {
    /// Creates a new reconciler that keeps every remote field.
    #[must_use]
    pub const fn new(config: &'a DeployConfig, config_dir: &'a Path, plane: &'a C, tree: &'a W) -> Self {
        Self {
            config,
            config_dir,
            plane,
            tree,
            options: MergeOptions::none(),
        }
    }

    /// Sets the fields whose local value is pushed.
    #[must_use]
    pub const fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Pushes every declared deployment and reports the changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the entrypoint cannot be resolved, the working tree
    /// cannot be inspected, or any control plane call fails.
    pub async fn deploy(&self) -> Result<DeployOutcome> {
        info!("Deploying flow '{}'", self.config.flow.name);

        let entries = self.tree.dirty_entries()?;
        if !entries.is_empty() {
            warn!(
                "Working tree has {} uncommitted change(s); nothing was pushed",
                entries.len()
            );
            return Ok(DeployOutcome::DirtyWorkingTree { entries });
        }

        let staged = self.stage().await?;

        let batch: Vec<DeploymentPush> = staged.iter().map(|s| s.push.clone()).collect();
        info!("Pushing {} deployment(s)", batch.len());
        self.plane.push_deployments(&self.config.flow.name, &batch).await?;

        let mut results = Vec::with_capacity(staged.len());
        for Staged { name, snapshot, .. } in staged {
            let updated = self.plane.fetch_deployment(&name).await?;
            let report = render_diff(updated.as_ref(), snapshot.as_ref());
            if report.is_none() {
                warn!("{name} could not be read back after the push");
            }
            results.push(DeploymentResult { name, report });
        }

        Ok(DeployOutcome::Deployed { results })
    }

    /// Reports what a deploy would change, without pushing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the entrypoint cannot be resolved or a fetch fails.
    pub async fn preview(&self) -> Result<Vec<DeploymentResult>> {
        info!("Previewing flow '{}'", self.config.flow.name);

        let staged = self.stage().await?;
        Ok(staged
            .into_iter()
            .map(|Staged { name, snapshot, push }| {
                let record = push.spec.to_record(&push.entrypoint, &push.work_pool);
                DeploymentResult {
                    report: render_diff(Some(&record), snapshot.as_ref()),
                    name,
                }
            })
            .collect())
    }

    /// Resolves the entrypoint, snapshots each deployment, and merges.
    async fn stage(&self) -> Result<Vec<Staged>> {
        let entrypoint =
            EntrypointSource::from_config(self.config)?.resolve(&self.tree.root(), self.config_dir)?;
        debug!("Entrypoint: {entrypoint}");

        let mut staged = Vec::with_capacity(self.config.deployments.len());
        for local in &self.config.deployments {
            let name = DeploymentName::new(&self.config.flow.name, &local.name);
            let snapshot = self.plane.fetch_deployment(&name).await?;
            if snapshot.is_none() {
                info!("{name} does not exist yet; it will be created");
            }

            let merged = merge(local, snapshot.as_ref(), self.options);
            let push = DeploymentPush::new(merged, entrypoint.clone(), self.config.work_pool.clone())
                .with_source(self.config.source.as_ref());

            staged.push(Staged { name, snapshot, push });
        }
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigParser, Schedule, ScheduleRule};
    use crate::error::{ControlPlaneError, FlowdeployError};
    use crate::planner::{Change, MergeField};
    use crate::repo::MockWorkingTree;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// In-memory control plane keyed by "flow/deployment".
    #[derive(Default)]
    struct FakePlane {
        records: Mutex<BTreeMap<String, RemoteDeployment>>,
        pushes: Mutex<Vec<Vec<DeploymentPush>>>,
        drop_after_push: Option<String>,
        fail_fetch: bool,
    }

    impl FakePlane {
        fn with_record(self, flow: &str, record: RemoteDeployment) -> Self {
            self.records
                .lock()
                .unwrap()
                .insert(format!("{flow}/{}", record.name), record);
            self
        }

        fn push_count(&self) -> usize {
            self.pushes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ControlPlane for FakePlane {
        async fn fetch_deployment(&self, name: &DeploymentName) -> Result<Option<RemoteDeployment>> {
            if self.fail_fetch {
                return Err(ControlPlaneError::api_error(500, "boom").into());
            }
            Ok(self.records.lock().unwrap().get(&name.to_string()).cloned())
        }

        async fn push_deployments(&self, flow: &str, batch: &[DeploymentPush]) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            for push in batch {
                let key = format!("{flow}/{}", push.spec.name);
                if self.drop_after_push.as_deref() == Some(key.as_str()) {
                    records.remove(&key);
                    continue;
                }
                let mut record = push.spec.to_record(&push.entrypoint, &push.work_pool);
                record.id = Uuid::new_v4();
                records.insert(key, record);
            }
            self.pushes.lock().unwrap().push(batch.to_vec());
            Ok(())
        }
    }

    const CONFIG: &str = r#"
flow:
  name: etl
  module: flow.py
  function: main
work_pool: pool
deployments:
  - name: nightly
    version: 2.0.0
    schedules:
      - cron: "0 2 * * *"
    tags: [a, b, c]
    parameters:
      x: 1
      y: 2
  - name: hourly
    version: 1.0.0
    schedules:
      - cron: "0 * * * *"
    tags: [fresh]
"#;

    fn config() -> DeployConfig {
        ConfigParser::new().parse_yaml(CONFIG, None).unwrap()
    }

    fn clean_tree() -> MockWorkingTree {
        let mut tree = MockWorkingTree::new();
        tree.expect_dirty_entries().returning(|| Ok(vec![]));
        tree.expect_root().return_const(PathBuf::from("/repo"));
        tree
    }

    fn existing_nightly() -> RemoteDeployment {
        let mut record = config().deployments[0].to_record("flows/etl/flow.py:main", "pool");
        record.parameters = BTreeMap::from([
            (String::from("x"), json!(1)),
            (String::from("y"), json!(3)),
        ]);
        record.tags = vec![String::from("a"), String::from("b")];
        record.schedules = vec![Schedule::inactive(ScheduleRule::cron("0 2 * * *", None))];
        record
    }

    fn config_dir() -> PathBuf {
        PathBuf::from("/repo/flows/etl")
    }

    #[tokio::test]
    async fn test_dirty_tree_pushes_nothing() {
        let config = config();
        let plane = FakePlane::default();
        let mut tree = MockWorkingTree::new();
        tree.expect_dirty_entries()
            .returning(|| Ok(vec![String::from(" M flows/etl/flow.py")]));
        let dir = config_dir();

        let outcome = Reconciler::new(&config, &dir, &plane, &tree).deploy().await.unwrap();
        assert!(matches!(
            outcome,
            DeployOutcome::DirtyWorkingTree { ref entries } if entries.len() == 1
        ));
        assert_eq!(plane.push_count(), 0);
    }

    #[tokio::test]
    async fn test_first_deploy_creates_from_local() {
        let config = config();
        let plane = FakePlane::default();
        let tree = clean_tree();
        let dir = config_dir();

        let outcome = Reconciler::new(&config, &dir, &plane, &tree).deploy().await.unwrap();
        let DeployOutcome::Deployed { results } = outcome else {
            panic!("expected a deploy");
        };

        assert_eq!(plane.push_count(), 1);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name.to_string(), "etl/nightly");
        let report = results[0].report.as_ref().unwrap();
        assert_eq!(report.entrypoint.current, "flows/etl/flow.py:main");
        assert_eq!(report.tags.added, vec!["a", "b", "c"]);
        assert!(report.parameters.changed);
    }

    #[tokio::test]
    async fn test_absent_flags_keep_remote_values() {
        let config = config();
        let plane = FakePlane::default().with_record("etl", existing_nightly());
        let tree = clean_tree();
        let dir = config_dir();

        let outcome = Reconciler::new(&config, &dir, &plane, &tree).deploy().await.unwrap();
        let DeployOutcome::Deployed { results } = outcome else {
            panic!("expected a deploy");
        };

        let report = results[0].report.as_ref().unwrap();
        assert!(report.tags.added.is_empty());
        assert!(!report.parameters.changed);
        assert!(report.schedules.iter().all(|s| s.change == Change::Unchanged));
    }

    #[tokio::test]
    async fn test_flags_push_local_values_against_snapshot() {
        let config = config();
        let plane = FakePlane::default().with_record("etl", existing_nightly());
        let tree = clean_tree();
        let dir = config_dir();

        let options = MergeOptions::none()
            .with(MergeField::Tags)
            .with(MergeField::Parameters)
            .with(MergeField::Schedules);
        let outcome = Reconciler::new(&config, &dir, &plane, &tree)
            .with_options(options)
            .deploy()
            .await
            .unwrap();
        let DeployOutcome::Deployed { results } = outcome else {
            panic!("expected a deploy");
        };

        let nightly = results[0].report.as_ref().unwrap();
        assert_eq!(nightly.tags.added, vec!["c"]);
        assert_eq!(nightly.tags.unchanged, vec!["a", "b"]);
        assert!(nightly.parameters.changed);
        let y = nightly.parameters.rows.iter().find(|r| r.key == "y").unwrap();
        assert_eq!(y.old_value.as_deref(), Some("3"));
        assert_eq!(nightly.schedules.len(), 2);

        let hourly = results[1].report.as_ref().unwrap();
        assert_eq!(hourly.tags.added, vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let config = config();
        let plane = FakePlane::default().with_record("etl", existing_nightly());
        let tree = clean_tree();
        let dir = config_dir();
        let reconciler =
            Reconciler::new(&config, &dir, &plane, &tree).with_options(MergeOptions::all());

        reconciler.deploy().await.unwrap();
        let DeployOutcome::Deployed { results } = reconciler.deploy().await.unwrap() else {
            panic!("expected a deploy");
        };

        for result in &results {
            assert!(result.report.as_ref().unwrap().is_unchanged());
        }
        assert_eq!(plane.push_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_record_after_push_has_no_report() {
        let config = config();
        let plane = FakePlane {
            drop_after_push: Some(String::from("etl/hourly")),
            ..FakePlane::default()
        };
        let tree = clean_tree();
        let dir = config_dir();

        let DeployOutcome::Deployed { results } =
            Reconciler::new(&config, &dir, &plane, &tree).deploy().await.unwrap()
        else {
            panic!("expected a deploy");
        };
        assert!(results[0].report.is_some());
        assert!(results[1].report.is_none());
    }

    #[tokio::test]
    async fn test_fetch_errors_propagate() {
        let config = config();
        let plane = FakePlane {
            fail_fetch: true,
            ..FakePlane::default()
        };
        let tree = clean_tree();
        let dir = config_dir();

        let err = Reconciler::new(&config, &dir, &plane, &tree).deploy().await.unwrap_err();
        assert!(matches!(err, FlowdeployError::ControlPlane(_)));
        assert_eq!(plane.push_count(), 0);
    }

    #[tokio::test]
    async fn test_preview_does_not_push() {
        let config = config();
        let plane = FakePlane::default().with_record("etl", existing_nightly());
        let mut tree = MockWorkingTree::new();
        tree.expect_root().return_const(PathBuf::from("/repo"));
        let dir = config_dir();

        let results = Reconciler::new(&config, &dir, &plane, &tree)
            .with_options(MergeOptions::none().with(MergeField::Tags))
            .preview()
            .await
            .unwrap();

        assert_eq!(plane.push_count(), 0);
        let nightly = results[0].report.as_ref().unwrap();
        assert_eq!(nightly.tags.added, vec!["c"]);
        assert!(!nightly.parameters.changed);
        assert!(results[1].report.as_ref().unwrap().entrypoint.previous.is_none());
    }
}
