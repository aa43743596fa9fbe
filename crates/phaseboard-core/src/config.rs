use crate::error::ErrorCode;
use crate::fetch::is_remote;
use crate::refresh::RefreshTiming;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the override candidate source.
pub const SOURCE_ENV: &str = "PHASEBOARD_SOURCE";

/// Project config location relative to the project root.
pub const PROJECT_CONFIG_PATH: &str = ".phaseboard/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub status: StatusSection,
}

/// Candidate snapshot locations, tried override → local → remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default, rename = "override")]
    pub override_source: Option<String>,
    #[serde(default = "default_local_source")]
    pub local: Option<String>,
    #[serde(default)]
    pub remote: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            override_source: None,
            local: default_local_source(),
            remote: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_notice_secs")]
    pub notice_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            notice_secs: default_notice_secs(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl RefreshConfig {
    /// A zero interval is clamped to one second.
    #[must_use]
    pub fn timing(&self) -> RefreshTiming {
        RefreshTiming {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            notice: Duration::from_secs(self.notice_secs),
        }
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSection {
    /// Path or URL of the status-set JSON override.
    #[serde(default)]
    pub config: Option<String>,
    /// Count every subtask toward progress, not just the current phase's.
    #[serde(default)]
    pub progress_all_subtasks: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::ConfigParseError
    }
}

fn load_toml<T>(path: &Path) -> Result<T, ConfigError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `.phaseboard/config.toml`; a missing file yields defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig, ConfigError> {
    load_toml(&project_root.join(PROJECT_CONFIG_PATH))
}

/// Load `<config_dir>/phaseboard/config.toml`; a missing file yields defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_toml(&config_dir.join("phaseboard/config.toml"))
}

/// Resolve a configured location: URLs pass through, relative paths are
/// anchored at the project root.
#[must_use]
pub fn resolve_location(project_root: &Path, location: &str) -> String {
    let location = location.trim();
    if location.is_empty() || is_remote(location) || Path::new(location).is_absolute() {
        return location.to_string();
    }
    project_root.join(location).display().to_string()
}

/// Ordered candidate list: override (flag, then env, then config), local, remote.
#[must_use]
pub fn candidate_sources(
    project_root: &Path,
    sources: &SourcesConfig,
    flag: Option<&str>,
) -> Vec<String> {
    let env_value = std::env::var(SOURCE_ENV).ok();
    candidate_sources_inner(project_root, sources, flag, env_value.as_deref())
}

fn candidate_sources_inner(
    project_root: &Path,
    sources: &SourcesConfig,
    flag: Option<&str>,
    env_value: Option<&str>,
) -> Vec<String> {
    fn non_blank(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|v| !v.is_empty())
    }

    let override_source = non_blank(flag)
        .or_else(|| non_blank(env_value))
        .or_else(|| non_blank(sources.override_source.as_deref()));

    [
        override_source,
        non_blank(sources.local.as_deref()),
        non_blank(sources.remote.as_deref()),
    ]
    .into_iter()
    .flatten()
    .map(|location| resolve_location(project_root, location))
    .collect()
}

#[allow(clippy::unnecessary_wraps)]
fn default_local_source() -> Option<String> {
    Some("data/rollup.yaml".to_string())
}

const fn default_interval_secs() -> u64 {
    300
}

const fn default_notice_secs() -> u64 {
    4
}

const fn default_debounce_ms() -> u64 {
    300
}
