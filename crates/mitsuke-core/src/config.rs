use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::MitsukeError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub matching: MatchingConfig,
    pub rate_limit: RateLimitConfig,
    pub anilist: AniListConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Comma-separated removal patterns, always applied.
    pub normal_words: String,
    /// Comma-separated removal patterns, applied on retry only.
    pub strict_words: String,
    pub max_partial_retries: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub min_interval_ms: u64,
    pub avg_interval_ms: u64,
    pub window_capacity: u32,
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn avg_interval(&self) -> Duration {
        Duration::from_millis(self.avg_interval_ms)
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AniListConfig {
    pub endpoint: String,
}

impl AppConfig {
    /// Load config: user file (if exists) merged over built-in defaults.
    pub fn load() -> Result<Self, MitsukeError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            Self::load_from(&user_path)
        } else {
            Self::from_toml("")
        }
    }

    /// Load a specific config file, merged over built-in defaults.
    pub fn load_from(path: &Path) -> Result<Self, MitsukeError> {
        let user_str = std::fs::read_to_string(path)?;
        Self::from_toml(&user_str)
    }

    /// Parse `user` (possibly partial) on top of the built-in defaults.
    pub fn from_toml(user: &str) -> Result<Self, MitsukeError> {
        let mut merged: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| MitsukeError::Config(e.to_string()))?;
        let user: toml::Table =
            toml::from_str(user).map_err(|e| MitsukeError::Config(e.to_string()))?;
        merge_tables(&mut merged, user);

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| MitsukeError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), MitsukeError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MitsukeError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Directory for rolling log files.
    pub fn log_dir() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "mitsuke")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

/// Recursively overlay `overlay` onto `base`; nested tables merge, other values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
