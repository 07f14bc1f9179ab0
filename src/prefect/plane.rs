//! Control plane trait definition.
//!
//! The reconciler talks to the control plane only through [`ControlPlane`], so
//! runs can be exercised against an in-memory implementation.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

use super::client::PrefectClient;
use super::record::{DeploymentName, DeploymentPush, RemoteDeployment};

/// Operations the reconciler needs from the control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetches a deployment; `None` if it does not exist.
    async fn fetch_deployment(&self, name: &DeploymentName) -> Result<Option<RemoteDeployment>>;

    /// Creates or updates every deployment of a flow in one batch.
    async fn push_deployments(&self, flow: &str, batch: &[DeploymentPush]) -> Result<()>;
}

#[async_trait]
impl ControlPlane for PrefectClient {
    async fn fetch_deployment(&self, name: &DeploymentName) -> Result<Option<RemoteDeployment>> {
        self.read_deployment_by_name(name).await
    }

    async fn push_deployments(&self, flow: &str, batch: &[DeploymentPush]) -> Result<()> {
        let flow_id = self.ensure_flow(flow).await?;
        for push in batch {
            let id = self.upsert_deployment(flow_id, push).await?;
            info!("Pushed {flow}/{} ({id})", push.spec.name);
        }
        Ok(())
    }
}
