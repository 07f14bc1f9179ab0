//! Project marker discovery.
//!
//! The repository root is located through a `pyproject.toml` marker file. Its
//! optional `[tool.flowdeploy]` table may point `git-repo-root` elsewhere.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

/// Project marker file name.
pub const PROJECT_MARKER: &str = "pyproject.toml";

/// Settings read from the `[tool.flowdeploy]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectSettings {
    /// Repository root override, relative to the marker's directory.
    #[serde(default)]
    pub git_repo_root: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Pyproject {
    #[serde(default)]
    tool: Option<ToolTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    flowdeploy: Option<ProjectSettings>,
}

/// Finds the project marker in `start` or its parents.
///
/// # Errors
///
/// Returns an error if no marker file exists up to the filesystem root.
pub fn find_project_marker(start: &Path) -> Result<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_MARKER))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            ConfigError::ProjectMarkerNotFound {
                start: start.to_path_buf(),
            }
            .into()
        })
}

/// Reads the `[tool.flowdeploy]` table; a missing table yields defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn read_project_settings(marker: &Path) -> Result<ProjectSettings> {
    let content = std::fs::read_to_string(marker).map_err(|e| {
        ConfigError::parse(format!("Failed to read file: {e}"), marker.display().to_string())
    })?;

    let pyproject: Pyproject = toml::from_str(&content).map_err(|e| {
        ConfigError::parse(format!("TOML parse error: {e}"), marker.display().to_string())
    })?;

    let settings = pyproject
        .tool
        .and_then(|tool| tool.flowdeploy)
        .unwrap_or_default();
    debug!("Project settings from {}: {settings:?}", marker.display());
    Ok(settings)
}

/// Determines the repository root from the marker nearest to `start`.
///
/// # Errors
///
/// Returns an error if no marker exists or its configured root is missing.
pub fn repo_root_from_marker(start: &Path) -> Result<PathBuf> {
    let marker = find_project_marker(start)?;
    info!("Using `{PROJECT_MARKER}` from {}", marker.display());

    let marker_dir = marker
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let settings = read_project_settings(&marker)?;

    let root = match settings.git_repo_root.as_deref() {
        None | Some(".") => marker_dir,
        Some(configured) => marker_dir.join(configured),
    };

    if !root.is_dir() {
        return Err(ConfigError::RepoRootNotFound { marker, root }.into());
    }

    Ok(root)
}
