//! Prefect API connection settings.
//!
//! Settings come from `PREFECT_API_URL`/`PREFECT_API_KEY` first, then from the
//! active profile in the Prefect profiles file.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Environment variable holding the API URL.
pub const API_URL_VAR: &str = "PREFECT_API_URL";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "PREFECT_API_KEY";

/// Connection settings for the Prefect API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    /// Base URL, e.g. `http://127.0.0.1:4200/api`.
    pub api_url: String,
    /// Bearer token, required for Prefect Cloud.
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    active: Option<String>,
    #[serde(default)]
    profiles: HashMap<String, HashMap<String, toml::Value>>,
}

impl ApiSettings {
    /// Creates settings from explicit values.
    #[must_use]
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key,
        }
    }

    /// Loads settings from the environment, falling back to the active profile.
    ///
    /// # Errors
    ///
    /// Returns an error if no API URL is configured anywhere or the profiles
    /// file cannot be parsed.
    pub fn load() -> Result<Self> {
        let env_url = non_empty_var(API_URL_VAR);
        let env_key = non_empty_var(API_KEY_VAR);

        if let Some(api_url) = env_url.clone()
            && env_key.is_some()
        {
            return Ok(Self::new(api_url, env_key));
        }

        let profile = match profiles_path() {
            Some(path) if path.is_file() => {
                let name = std::env::var("PREFECT_PROFILE").ok();
                load_profile(&path, name.as_deref())?
            }
            _ => HashMap::new(),
        };

        let api_url = env_url
            .or_else(|| profile.get(API_URL_VAR).cloned())
            .ok_or_else(|| ConfigError::MissingEnvVar {
                name: String::from(API_URL_VAR),
            })?;
        let api_key = env_key.or_else(|| profile.get(API_KEY_VAR).cloned());

        debug!("Using Prefect API at {api_url}");
        Ok(Self::new(api_url, api_key))
    }
}

/// Reads the string settings of a profile.
///
/// Without an explicit name the file's `active` profile is used, then
/// `default`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_profile(path: &Path, name: Option<&str>) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::parse(format!("Failed to read profiles: {e}"), path.display().to_string())
    })?;
    let file: ProfilesFile = toml::from_str(&content).map_err(|e| {
        ConfigError::parse(format!("TOML parse error: {e}"), path.display().to_string())
    })?;

    let name = name
        .map(String::from)
        .or(file.active)
        .unwrap_or_else(|| String::from("default"));
    debug!("Reading Prefect profile '{name}' from {}", path.display());

    Ok(file
        .profiles
        .get(&name)
        .map(|settings| {
            settings
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default())
}

/// Location of the Prefect profiles file.
fn profiles_path() -> Option<PathBuf> {
    if let Some(path) = non_empty_var("PREFECT_PROFILES_PATH") {
        return Some(PathBuf::from(path));
    }
    non_empty_var("PREFECT_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".prefect")))
        .map(|home| home.join("profiles.toml"))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROFILES: &str = r#"
active = "cloud"

[profiles.default]
PREFECT_API_URL = "http://127.0.0.1:4200/api"

[profiles.cloud]
PREFECT_API_URL = "https://api.prefect.cloud/api/accounts/a/workspaces/w"
PREFECT_API_KEY = "pnu_secret"
PREFECT_LOGGING_LEVEL = "DEBUG"
"#;

    fn write_profiles() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.toml");
        std::fs::write(&path, PROFILES).unwrap();
        (dir, path)
    }

    #[test]
    fn test_active_profile_is_default_choice() {
        let (_dir, path) = write_profiles();
        let profile = load_profile(&path, None).unwrap();
        assert_eq!(profile.get(API_KEY_VAR).map(String::as_str), Some("pnu_secret"));
    }

    #[test]
    fn test_named_profile_wins() {
        let (_dir, path) = write_profiles();
        let profile = load_profile(&path, Some("default")).unwrap();
        assert_eq!(
            profile.get(API_URL_VAR).map(String::as_str),
            Some("http://127.0.0.1:4200/api")
        );
        assert!(!profile.contains_key(API_KEY_VAR));
    }

    #[test]
    fn test_unknown_profile_is_empty() {
        let (_dir, path) = write_profiles();
        assert!(load_profile(&path, Some("missing")).unwrap().is_empty());
    }
}
