//! Configuration module for flowdeploy.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `flowdeploy.yaml`
//! - Validation of declared deployments
//! - Entrypoint resolution and project marker discovery

mod spec;
mod parser;
mod validator;
mod entrypoint;
mod project;

pub use spec::{
    CronRule, DeployConfig, DeploymentSpec, FlowConfig, IntervalRule, RRuleRule, Schedule,
    ScheduleRule, SourceConfig, ValueMap,
};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, SOURCE_BRANCH_VAR, WORK_POOL_VAR, find_config_file,
};
pub use validator::{ConfigValidator, ValidationResult};
pub use entrypoint::{DEFAULT_FLOW_FUNCTION, DEFAULT_FLOW_MODULE, EntrypointSource};
pub use project::{
    PROJECT_MARKER, ProjectSettings, find_project_marker, read_project_settings,
    repo_root_from_marker,
};
