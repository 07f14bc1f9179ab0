//! Configuration parser for loading deploy files.
//!
//! This module handles loading the deploy file from YAML and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, FlowdeployError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::DeployConfig;

/// Environment variable overriding the work pool.
pub const WORK_POOL_VAR: &str = "FLOWDEPLOY_WORK_POOL";

/// Environment variable overriding the source branch.
pub const SOURCE_BRANCH_VAR: &str = "FLOWDEPLOY_SOURCE_BRANCH";

/// Configuration parser for loading deploy files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// Relative `description_file` entries are resolved against the file's
    /// directory and inlined into `description`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let path = path.as_ref();
        info!("Loading deploy file from: {}", path.display());

        if !path.exists() {
            return Err(FlowdeployError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::parse(format!("Failed to read file: {e}"), path.display().to_string())
        })?;

        let mut config = self.parse_yaml(&content, Some(path))?;

        let base = self
            .base_path
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::inline_descriptions(&mut config, &base)?;

        Ok(config)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployConfig> {
        debug!("Parsing YAML deploy file");

        let config: DeployConfig = serde_yaml::from_str(content).map_err(|e| {
            FlowdeployError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!(
            "Parsed {} deployment(s) for flow: {}",
            config.deployments.len(),
            config.flow.name
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Recognized variables: `FLOWDEPLOY_WORK_POOL`, `FLOWDEPLOY_SOURCE_BRANCH`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides looked up by variable name.
    fn apply_overrides(config: &mut DeployConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(pool) = lookup(WORK_POOL_VAR) {
            debug!("Overriding work_pool from environment");
            config.work_pool = pool;
        }

        if let Some(branch) = lookup(SOURCE_BRANCH_VAR)
            && let Some(source) = config.source.as_mut()
        {
            debug!("Overriding source.branch from environment");
            source.branch = Some(branch);
        }
    }

    /// Reads `description_file` entries into the description field.
    fn inline_descriptions(config: &mut DeployConfig, base: &Path) -> Result<()> {
        for deployment in &mut config.deployments {
            if deployment.description.is_some() {
                continue;
            }
            let Some(file) = deployment.description_file.take() else {
                continue;
            };

            let path = base.join(&file);
            debug!("Reading description for {} from {}", deployment.name, path.display());
            let text = std::fs::read_to_string(&path).map_err(|e| {
                ConfigError::parse(
                    format!("Failed to read description file: {e}"),
                    path.display().to_string(),
                )
            })?;
            deployment.description = Some(text);
        }
        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConfigError::parse(
                    format!("Failed to load .env file: {e}"),
                    env_path.display().to_string(),
                )
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default deploy file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "flowdeploy.yaml",
    "flowdeploy.yml",
    "deploy.yaml",
    "deploy.yml",
];

/// Finds the deploy file in the given directory or its parents.
///
/// Relative start directories are resolved against the working directory
/// before walking up.
///
/// # Errors
///
/// Returns an error if the start directory cannot be resolved or no deploy
/// file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref().canonicalize()?;

    for dir in start.ancestors() {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = dir.join(filename);
            if config_path.exists() {
                info!("Found deploy file: {}", config_path.display());
                return Ok(config_path);
            }
        }
    }

    Err(FlowdeployError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
