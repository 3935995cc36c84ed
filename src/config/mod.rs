//! Configuration management for coursetrack

pub mod progress;
pub mod session;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub use progress::{CachedProgress, ProgressCache};
pub use session::{FileResumeStore, MemoryResumeStore, ResumeStore, ResumeToken};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the course backend
    pub api_base_url: String,

    /// Seconds between periodic progress checkpoints
    pub flush_interval_secs: u64,

    /// Timeout for backend requests (seconds)
    pub request_timeout_secs: u64,

    /// Course used when a command does not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            flush_interval_secs: 15,
            request_timeout_secs: 30,
            course_id: None,
        }
    }
}

impl Config {
    /// Load configuration from disk, or create default if not exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse config.json")
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "coursetrack")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.json"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "coursetrack")
            .context("Failed to determine data directory")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Interval of the periodic checkpoint, never below one second
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// The course to use: the explicit one, else the configured default
    pub fn course<'a>(&'a self, explicit: Option<&'a str>) -> Result<&'a str> {
        explicit
            .or(self.course_id.as_deref())
            .context("No course given and no default course_id in config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_flushes_every_fifteen_seconds() {
        let config = Config::default();
        assert_eq!(config.flush_interval(), Duration::from_secs(15));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = Config { flush_interval_secs: 0, ..Default::default() };
        assert_eq!(config.flush_interval(), Duration::from_secs(1));
    }

    #[test]
    fn config_deserializes_partial_json() {
        let json = r#"{"api_base_url":"https://lms.example.com/api","course_id":"c42"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_base_url, "https://lms.example.com/api");
        assert_eq!(config.flush_interval_secs, 15);
        assert_eq!(config.course(None).unwrap(), "c42");
        assert_eq!(config.course(Some("c1")).unwrap(), "c1");
    }

    #[test]
    fn missing_course_is_an_error() {
        assert!(Config::default().course(None).is_err());
    }

    #[test]
    fn load_creates_defaults_then_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let custom = Config { course_id: Some("c7".into()), ..config };
        custom.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), custom);
    }
}
