use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::CacheConfig;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpilloverConfig {
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `text`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl SpilloverConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SpilloverConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Convert to CacheConfig
    pub fn to_cache_config(&self) -> CacheConfig {
        self.cache.clone()
    }
}
