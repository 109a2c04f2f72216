//! # Configuration Management Module
//!
//! Festquest reads a single TOML file. Every section has defaults, so a missing
//! section simply falls back to them.
//!
//! ## Configuration Structure
//!
//! - [`StorageConfig`] - where the sled database lives
//! - [`LoggingConfig`] - log level and optional log file
//! - [`QuestConfig`] - level cap, reward rates and an optional curated catalog seed
//! - [`ProvisioningConfig`] - starting balance for newly provisioned participants
//!
//! ## Usage
//!
//! ```rust,no_run
//! use festquest::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("festquest.toml").await?;
//!     println!("Max quest level: {}", config.quests.max_level);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data"
//!
//! [logging]
//! level = "info"
//! file = "festquest.log"
//!
//! [quests]
//! max_level = 10
//! currency_per_difficulty = 10
//! experience_per_difficulty = 20
//! catalog_file = "data/seeds/quests.json"
//!
//! [provisioning]
//! starting_currency = 100
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("festquest.log".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestConfig {
    /// Highest level per category; completing it clears the category.
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    #[serde(default = "default_currency_per_difficulty")]
    pub currency_per_difficulty: u64,
    #[serde(default = "default_experience_per_difficulty")]
    pub experience_per_difficulty: u64,
    /// Optional JSON seed merged into the curated catalog on startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_file: Option<String>,
}

fn default_max_level() -> u32 {
    10
}

fn default_currency_per_difficulty() -> u64 {
    10
}

fn default_experience_per_difficulty() -> u64 {
    20
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            max_level: default_max_level(),
            currency_per_difficulty: default_currency_per_difficulty(),
            experience_per_difficulty: default_experience_per_difficulty(),
            catalog_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(default = "default_starting_currency")]
    pub starting_currency: u64,
}

fn default_starting_currency() -> u64 {
    100
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            starting_currency: default_starting_currency(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub quests: QuestConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.quests.max_level == 0 {
            return Err(anyhow!("quests.max_level must be at least 1"));
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_reward_rates() {
        let config = Config::default();
        assert_eq!(config.quests.max_level, 10);
        assert_eq!(config.quests.currency_per_difficulty, 10);
        assert_eq!(config.quests.experience_per_difficulty, 20);
        assert_eq!(config.provisioning.starting_currency, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str("[quests]\nmax_level = 3\n").unwrap();
        assert_eq!(config.quests.max_level, 3);
        assert_eq!(config.quests.currency_per_difficulty, 10);
        assert_eq!(config.storage.data_dir, "./data");
    }

    #[test]
    fn test_zero_max_level_is_rejected() {
        let mut config = Config::default();
        config.quests.max_level = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_create_default_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("festquest.toml");
        let path = path.to_str().unwrap();
        tokio_test::block_on(Config::create_default(path)).unwrap();
        let loaded = tokio_test::block_on(Config::load(path)).unwrap();
        assert_eq!(loaded.quests.max_level, 10);
        assert_eq!(loaded.logging.file.as_deref(), Some("festquest.log"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = tokio_test::block_on(Config::load("/nonexistent/festquest.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/festquest.toml"));
    }
}
