//! Prefect API integration module.
//!
//! This module provides everything needed to talk to the control plane:
//! connection settings, the REST client, the record model the reconciler
//! works on, and the [`ControlPlane`] seam.

mod client;
mod plane;
mod record;
mod settings;
mod types;

pub use client::PrefectClient;
pub use plane::ControlPlane;
pub use record::{DeploymentName, DeploymentPush, GIT_CLONE_STEP, RemoteDeployment, git_clone_step};
pub use settings::{API_KEY_VAR, API_URL_VAR, ApiSettings, load_profile};
pub use types::{
    DeploymentCreate, DeploymentResponse, DeploymentScheduleCreate, DeploymentScheduleResponse,
    FlowCreate, FlowResponse, IdResponse,
};
