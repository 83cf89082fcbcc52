//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::query::PastMonthDay;
use crate::store::DEFAULT_HISTORY_LIMIT;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Record source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Directory holding tasks.json, projects.json and timelogs.json
    #[serde(default = "default_data_dir")]
    pub dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("tasklens").to_string_lossy().to_string())
        .unwrap_or_else(|| "./tasklens_data".to_string())
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

/// Saved query store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_store_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("tasklens").join("queries.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./tasklens_data/queries.json".to_string())
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            history_limit: default_history_limit(),
        }
    }
}

/// Query semantics configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryConfig {
    /// How `due:mmdd` resolves once the day has passed this year
    #[serde(default)]
    pub past_month_day: PastMonthDay,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Default config file locations, highest priority first
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("tasklens").join("config.toml")),
            Some(PathBuf::from("./tasklens.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load the first of `paths` that exists, with environment overrides.
    ///
    /// Returns the path the config was read from, or `None` when no file
    /// exists. A file that exists but cannot be read or parsed is an error, so
    /// the caller decides how to report it.
    pub fn load_first(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match paths.iter().find(|p| p.exists()) {
            Some(path) => Ok((Self::load_with_env(path)?, Some(path.clone()))),
            None => Ok((Self::from_env(), None)),
        }
    }

    /// Record directory with `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.data.dir)
    }

    /// Saved query file with `~` expanded
    pub fn store_path(&self) -> PathBuf {
        expand_home(&self.store.path)
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("TASKLENS_DATA_DIR") {
            self.data.dir = dir;
        }

        if let Some(path) = lookup("TASKLENS_STORE_PATH") {
            self.store.path = path;
        }
        if let Some(limit) = lookup("TASKLENS_HISTORY_LIMIT") {
            match limit.parse() {
                Ok(n) => self.store.history_limit = n,
                Err(_) => tracing::warn!("Ignoring invalid TASKLENS_HISTORY_LIMIT: {}", limit),
            }
        }

        if let Some(level) = lookup("TASKLENS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("TASKLENS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Tasklens Configuration
#
# Environment variables override these settings:
# - TASKLENS_DATA_DIR
# - TASKLENS_STORE_PATH
# - TASKLENS_HISTORY_LIMIT
# - TASKLENS_LOG_LEVEL
# - TASKLENS_LOG_FORMAT

[data]
# Directory containing tasks.json, projects.json and timelogs.json
dir = "~/.local/share/tasklens"

[store]
# File holding saved queries and run history
path = "~/.local/share/tasklens/queries.json"

# Number of executed queries kept in history (0 disables history)
history_limit = 100

[query]
# How due:mmdd resolves once that day has passed this year:
# "next_year" or "current_year"
past_month_day = "next_year"

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty or json
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.store.history_limit, 100);
        assert_eq!(config.query.past_month_day, PastMonthDay::NextYear);
        assert_eq!(config.logging.format, "pretty");
        assert!(!config.data_dir().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [query]
            past_month_day = "current_year"
            "#,
        )
        .unwrap();
        assert_eq!(config.query.past_month_day, PastMonthDay::CurrentYear);
        assert_eq!(config.store.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[data]\ndir = \"/srv/tasks\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_dir(), PathBuf::from("/srv/tasks"));

        std::fs::write(&path, "[data\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Config::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_load_first_picks_existing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let local = dir.path().join("tasklens.toml");

        let (_, path) = Config::load_first(&[missing.clone()]).unwrap();
        assert_eq!(path, None);

        std::fs::write(&local, "[store]\nhistory_limit = 7\n").unwrap();
        let (config, path) = Config::load_first(&[missing.clone(), local.clone()]).unwrap();
        assert_eq!(path, Some(local.clone()));
        assert_eq!(config.store.history_limit, 7);

        // a malformed file is reported instead of silently skipped
        std::fs::write(&local, "[store\n").unwrap();
        assert!(matches!(
            Config::load_first(&[missing, local]),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TASKLENS_DATA_DIR", "/data"),
            ("TASKLENS_STORE_PATH", "/data/q.json"),
            ("TASKLENS_HISTORY_LIMIT", "5"),
            ("TASKLENS_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.data.dir, "/data");
        assert_eq!(config.store_path(), PathBuf::from("/data/q.json"));
        assert_eq!(config.store.history_limit, 5);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_invalid_history_limit_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "TASKLENS_HISTORY_LIMIT").then(|| "lots".to_string()));
        assert_eq!(config.store.history_limit, DEFAULT_HISTORY_LIMIT);
    }
}
