//! Configuration management for the rotation publisher
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::state::CategoryFamilies;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rotation configuration
    pub rotation: RotationConfig,

    /// Broadcast channel configuration
    pub channel: ChannelConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Rotation-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Ordered humanitarian category ids
    pub humanitarian_categories: Vec<String>,

    /// Ordered technical category ids
    pub technical_categories: Vec<String>,

    /// Daily publish quota
    pub posts_per_day: u32,

    /// Wrap category scans past the end of the item list
    pub reset_on_end: bool,

    /// Seconds between sequential sends
    pub inter_post_delay_secs: u64,

    /// Publish windows as "HH:MM-HH:MM" specs
    pub windows: Vec<String>,
}

/// Broadcast channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel API endpoint URL
    pub endpoint: String,

    /// Bearer token for the channel API
    pub auth_token: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retry attempts for transient send failures
    pub max_retries: u32,

    /// Total seconds to wait for a discussion thread to appear
    pub thread_resolve_timeout_secs: u64,

    /// Seconds between thread-resolution polls
    pub thread_resolve_interval_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Content catalog path (JSON)
    pub catalog_path: PathBuf,

    /// Persisted schedule state path
    pub state_path: PathBuf,

    /// Audit log path
    pub audit_path: PathBuf,

    /// Audit entries retained before the oldest are trimmed
    pub audit_max_entries: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("ROTOGRAM_CHANNEL_ENDPOINT") {
            config.channel.endpoint = endpoint;
        }
        if let Ok(token) = std::env::var("ROTOGRAM_CHANNEL_TOKEN") {
            config.channel.auth_token = token;
        }
        if let Some(timeout) = std::env::var("ROTOGRAM_CHANNEL_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.channel.timeout_secs = timeout;
        }

        if let Ok(path) = std::env::var("ROTOGRAM_CATALOG_PATH") {
            config.storage.catalog_path = path.into();
        }
        if let Ok(path) = std::env::var("ROTOGRAM_STATE_PATH") {
            config.storage.state_path = path.into();
        }
        if let Ok(path) = std::env::var("ROTOGRAM_AUDIT_PATH") {
            config.storage.audit_path = path.into();
        }

        if let Some(quota) = std::env::var("ROTOGRAM_POSTS_PER_DAY")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            config.rotation.posts_per_day = quota;
        }

        if let Ok(level) = std::env::var("ROTOGRAM_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("ROTOGRAM_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.rotation.posts_per_day == 0 {
            anyhow::bail!("posts_per_day must be greater than 0");
        }

        if self.rotation.humanitarian_categories.is_empty() {
            anyhow::bail!("humanitarian_categories must not be empty");
        }

        if self.rotation.technical_categories.is_empty() {
            anyhow::bail!("technical_categories must not be empty");
        }

        if self.rotation.windows.len() != self.rotation.posts_per_day as usize {
            anyhow::bail!(
                "expected {} publish windows to match posts_per_day, got {}",
                self.rotation.posts_per_day,
                self.rotation.windows.len()
            );
        }

        if self.channel.timeout_secs == 0 {
            anyhow::bail!("channel timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Category families for the planner
    #[must_use]
    pub fn families(&self) -> CategoryFamilies {
        CategoryFamilies::new(
            self.rotation.humanitarian_categories.clone(),
            self.rotation.technical_categories.clone(),
        )
    }

    /// Delay between sequential sends as Duration
    #[must_use]
    pub fn inter_post_delay(&self) -> Duration {
        Duration::from_secs(self.rotation.inter_post_delay_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rotation: RotationConfig::default(),
            channel: ChannelConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            humanitarian_categories: vec![
                String::from("communication"),
                String::from("career"),
            ],
            technical_categories: vec![
                String::from("algorithms"),
                String::from("databases"),
                String::from("networking"),
                String::from("security"),
                String::from("architecture"),
            ],
            posts_per_day: 4,
            reset_on_end: true,
            inter_post_delay_secs: 3,
            windows: vec![
                String::from("08:00-11:00"),
                String::from("11:00-14:00"),
                String::from("14:00-17:00"),
                String::from("17:00-20:00"),
            ],
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("http://localhost:8080"),
            auth_token: String::new(),
            timeout_secs: 10,
            max_retries: 3,
            thread_resolve_timeout_secs: 10,
            thread_resolve_interval_secs: 1,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("data/catalog.json"),
            state_path: PathBuf::from("data/schedule_state.json"),
            audit_path: PathBuf::from("data/audit_log.json"),
            audit_max_entries: crate::storage::audit::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_quota_rejected() {
        let mut config = Config::default();
        config.rotation.posts_per_day = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_count_must_match_quota() {
        let mut config = Config::default();
        config.rotation.windows.pop();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_families_rejected() {
        let mut config = Config::default();
        config.rotation.technical_categories.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_families_preserve_order() {
        let config = Config::default();
        let families = config.families();
        assert_eq!(families.technical[0], "algorithms");
        assert_eq!(families.period(), 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [channel]
            endpoint = "https://chat.example.com/api"
            "#,
        )
        .unwrap();

        assert_eq!(config.channel.endpoint, "https://chat.example.com/api");
        assert_eq!(config.rotation.posts_per_day, 4);
        assert_eq!(config.logging.level, "info");
    }
}
