//! Repository context.
//!
//! The repository root anchors entrypoint derivation, and the working tree
//! must be clean before anything is pushed. [`RepoContext`] is built once per
//! run and passed explicitly to whatever needs it.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::config::repo_root_from_marker;
use crate::error::{GitError, Result};

/// Environment variable overriding repository root detection.
pub const GIT_REPO_ROOT_VAR: &str = "GIT_REPO_ROOT";

/// Read access to a version-controlled working tree.
#[cfg_attr(test, mockall::automock)]
pub trait WorkingTree: Send + Sync {
    /// Returns the working tree root.
    fn root(&self) -> PathBuf;

    /// Returns porcelain status lines for modified and untracked files.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be determined.
    fn dirty_entries(&self) -> Result<Vec<String>>;
}

/// A git repository located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    root: PathBuf,
}

impl RepoContext {
    /// Creates a context for a known root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Detects the repository root for a working directory.
    ///
    /// `GIT_REPO_ROOT` wins when set; otherwise the project marker nearest to
    /// `cwd` decides.
    ///
    /// # Errors
    ///
    /// Returns an error if no marker is found or its configured root is missing.
    pub fn discover(cwd: &Path) -> Result<Self> {
        let root_override = std::env::var_os(GIT_REPO_ROOT_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::discover_with(cwd, root_override)
    }

    /// Detects the repository root, preferring an explicit override.
    fn discover_with(cwd: &Path, root_override: Option<PathBuf>) -> Result<Self> {
        let root = if let Some(root) = root_override {
            info!("Using {GIT_REPO_ROOT_VAR}={}", root.display());
            root
        } else {
            repo_root_from_marker(cwd)?
        };

        let root = root.canonicalize().unwrap_or(root);
        debug!("Repository root: {}", root.display());
        Ok(Self::new(root))
    }

    /// Returns true if the tree has uncommitted or untracked changes.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run in the root.
    pub fn is_dirty(&self) -> Result<bool> {
        Ok(!self.dirty_entries()?.is_empty())
    }
}

impl WorkingTree for RepoContext {
    fn root(&self) -> PathBuf {
        self.root.clone()
    }

    fn dirty_entries(&self) -> Result<Vec<String>> {
        let output = Command::new("git")
            .args(["status", "--porcelain", "--untracked-files=normal"])
            .current_dir(&self.root)
            .output()
            .map_err(|e| GitError::CommandFailed {
                message: format!("git status: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a git repository") {
                return Err(GitError::NotARepository {
                    path: self.root.clone(),
                }
                .into());
            }
            return Err(GitError::CommandFailed {
                message: stderr.trim().to_string(),
            }
            .into());
        }

        let entries: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect();
        debug!("{} dirty entries in {}", entries.len(), self.root.display());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .is_ok_and(|o| o.status.success())
    }

    #[test]
    fn test_untracked_file_makes_tree_dirty() {
        let dir = TempDir::new().unwrap();
        if !git(dir.path(), &["init", "-q"]) {
            return;
        }
        let repo = RepoContext::new(dir.path());
        assert!(!repo.is_dirty().unwrap());

        std::fs::write(dir.path().join("flow.py"), "def main(): ...\n").unwrap();
        let entries = repo.dirty_entries().unwrap();
        assert_eq!(entries, vec![String::from("?? flow.py")]);
        assert!(repo.is_dirty().unwrap());
    }

    #[test]
    fn test_outside_repository_is_error() {
        let dir = TempDir::new().unwrap();
        let repo = RepoContext::new(dir.path());
        let status = Command::new("git").arg("--version").output();
        if status.is_err() {
            return;
        }
        assert!(repo.dirty_entries().is_err());
    }

    #[test]
    fn test_discover_uses_project_marker() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(crate::config::PROJECT_MARKER), "").unwrap();
        let nested = dir.path().join("flows").join("etl");
        std::fs::create_dir_all(&nested).unwrap();

        let repo = RepoContext::discover_with(&nested, None).unwrap();
        assert_eq!(repo.root(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_override_wins_over_project_marker() {
        let marker_dir = TempDir::new().unwrap();
        std::fs::write(marker_dir.path().join(crate::config::PROJECT_MARKER), "").unwrap();
        let override_dir = TempDir::new().unwrap();

        let repo = RepoContext::discover_with(
            marker_dir.path(),
            Some(override_dir.path().to_path_buf()),
        )
        .unwrap();
        assert_eq!(repo.root(), override_dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_override_skips_marker_search() {
        let dir = TempDir::new().unwrap();
        let repo = RepoContext::discover_with(dir.path(), Some(dir.path().to_path_buf()));
        assert!(repo.is_ok());
    }

    #[test]
    fn test_root_accessor() {
        let repo = RepoContext::new("/repo");
        assert_eq!(repo.root(), PathBuf::from("/repo"));
    }
}
