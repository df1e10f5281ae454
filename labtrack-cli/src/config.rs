//! Application configuration
//!
//! Loaded from `~/.config/labtrack-cli/config.toml` when present; every field
//! has a sensible default so a missing file is not an error.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Directory holding staged workbook uploads
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Days a staged upload is kept before `sweep` removes it
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: default_database_path(),
            staging_dir: default_staging_dir(),
            retention_days: default_retention_days(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("labtrack-cli")
}

fn default_database_path() -> PathBuf {
    config_dir().join("labtrack.db")
}

fn default_staging_dir() -> PathBuf {
    config_dir().join("staging")
}

fn default_retention_days() -> u32 {
    7
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir().join("config.toml"))
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from(std::path::Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.retention_days, 7);
        assert!(config.database_path.ends_with("labtrack.db"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("retention_days = 30").unwrap();
        assert_eq!(config.retention_days, 30);
        assert!(config.staging_dir.ends_with("staging"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(toml::from_str::<Config>("retention_days = \"soon\"").is_err());
    }
}
