//! Error types for the flowdeploy reconciliation tool.
//!
//! This module provides the error hierarchy for every step of a deploy run:
//! configuration loading, repository inspection, and control plane calls.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for flowdeploy.
#[derive(Debug, Error)]
pub enum FlowdeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Control plane (Prefect API) errors.
    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    /// Git repository errors.
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A required setting is missing from both the environment and the profile.
    #[error("Missing setting: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Duplicate deployment definition.
    #[error("Duplicate deployment name: {name}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },

    /// Both an explicit entrypoint and a flow module were declared.
    #[error("Both `entrypoint` and `flow.module`/`flow.function` are set; declare exactly one")]
    EntrypointConflict,

    /// Neither entrypoint form was declared.
    #[error("No entrypoint declared; set `entrypoint` or `flow.module`/`flow.function`")]
    EntrypointMissing,

    /// The deploy file lives outside of the repository root.
    #[error("{path} is not inside the repository root {root}")]
    OutsideRepository {
        /// Directory that was expected under the root.
        path: PathBuf,
        /// Detected repository root.
        root: PathBuf,
    },

    /// No project marker file in the start directory or its parents.
    #[error("Could not find a pyproject.toml file in {start} or its parents")]
    ProjectMarkerNotFound {
        /// Directory the search started from.
        start: PathBuf,
    },

    /// The configured repository root does not exist.
    #[error("'git-repo-root' in {marker} points to {root}, but that directory was not found")]
    RepoRootNotFound {
        /// Marker file holding the setting.
        marker: PathBuf,
        /// Configured root.
        root: PathBuf,
    },
}

/// Control plane errors.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Authentication failed.
    #[error("Prefect authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Prefect API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("Prefect API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with Prefect: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from Prefect API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Git repository errors.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git executable could not be run.
    #[error("Failed to run git: {message}")]
    CommandFailed {
        /// Description of the failure.
        message: String,
    },

    /// The directory is not a git work tree.
    #[error("Not a git repository: {path}")]
    NotARepository {
        /// Directory that was inspected.
        path: PathBuf,
    },
}

/// Result type alias for flowdeploy operations.
pub type Result<T> = std::result::Result<T, FlowdeployError>;

impl FlowdeployError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ControlPlane(
                ControlPlaneError::RateLimited { .. } | ControlPlaneError::NetworkError { .. }
            )
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::ControlPlane(ControlPlaneError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            Self::ControlPlane(ControlPlaneError::NetworkError { .. }) => Some(1),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error tied to a file.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

impl ControlPlaneError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
