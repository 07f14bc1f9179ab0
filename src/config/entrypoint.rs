//! Flow entrypoint resolution.
//!
//! An entrypoint is either declared verbatim (`path/to/flow.py:main`) or
//! derived from the deploy file location and the flow module/function names.

use std::path::{Component, Path};

use crate::error::{ConfigError, Result};

use super::spec::DeployConfig;

/// Default flow module file name.
pub const DEFAULT_FLOW_MODULE: &str = "flow.py";

/// Default flow callable name.
pub const DEFAULT_FLOW_FUNCTION: &str = "main";

/// The declared entrypoint form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrypointSource {
    /// Used as-is.
    Explicit(String),
    /// Derived relative to the repository root.
    Derived {
        /// Module file next to the deploy file.
        module: String,
        /// Callable inside the module.
        function: String,
    },
}

impl EntrypointSource {
    /// Picks the entrypoint form declared by a deploy file.
    ///
    /// # Errors
    ///
    /// Returns an error if both forms or neither form are declared.
    pub fn from_config(config: &DeployConfig) -> Result<Self> {
        let derived = config.flow.module.is_some() || config.flow.function.is_some();

        match (config.entrypoint.as_deref(), derived) {
            (Some(_), true) => Err(ConfigError::EntrypointConflict.into()),
            (None, false) => Err(ConfigError::EntrypointMissing.into()),
            (Some(explicit), false) => Ok(Self::Explicit(explicit.to_string())),
            (None, true) => Ok(Self::Derived {
                module: config
                    .flow
                    .module
                    .clone()
                    .unwrap_or_else(|| String::from(DEFAULT_FLOW_MODULE)),
                function: config
                    .flow
                    .function
                    .clone()
                    .unwrap_or_else(|| String::from(DEFAULT_FLOW_FUNCTION)),
            }),
        }
    }

    /// Resolves to the entrypoint string pushed to the control plane.
    ///
    /// # Errors
    ///
    /// Returns an error if `config_dir` is not inside `repo_root`.
    pub fn resolve(&self, repo_root: &Path, config_dir: &Path) -> Result<String> {
        match self {
            Self::Explicit(entrypoint) => Ok(entrypoint.clone()),
            Self::Derived { module, function } => {
                let relative = config_dir.strip_prefix(repo_root).map_err(|_| {
                    ConfigError::OutsideRepository {
                        path: config_dir.to_path_buf(),
                        root: repo_root.to_path_buf(),
                    }
                })?;

                let mut segments: Vec<String> = relative
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect();
                segments.push(module.clone());

                Ok(format!("{}:{function}", segments.join("/")))
            }
        }
    }
}
