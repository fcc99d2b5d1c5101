// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! Configuration management for Brickscan

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Vision service settings
    #[serde(default)]
    pub vision: VisionConfig,

    /// Catalog database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Stored crop image settings
    #[serde(default)]
    pub images: ImageStoreConfig,

    /// Part-metadata API settings
    #[serde(default)]
    pub parts_api: PartsApiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VisionConfig {
    #[serde(default = "default_vision_url")]
    pub url: String,
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Cap on concurrent identify calls during one scan
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ImageStoreConfig {
    #[serde(default = "default_image_dir")]
    pub dir: String,
    /// Whether commit stores candidate crops at all
    #[serde(default = "default_true")]
    pub store_crops: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PartsApiConfig {
    #[serde(default = "default_parts_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

// Default value functions
fn default_vision_url() -> String { "http://localhost:9090".to_string() }
fn default_vision_model() -> String { "partnet".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_retries() -> u32 { 3 }
fn default_max_concurrent() -> usize { 4 }
fn default_db_path() -> String { "brickscan.db".to_string() }
fn default_image_dir() -> String { "crops".to_string() }
fn default_parts_url() -> String { "https://rebrickable.com/api/v3".to_string() }
fn default_true() -> bool { true }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vision: VisionConfig::default(),
            database: DatabaseConfig::default(),
            images: ImageStoreConfig::default(),
            parts_api: PartsApiConfig::default(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            url: default_vision_url(),
            model: default_vision_model(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            dir: default_image_dir(),
            store_crops: true,
        }
    }
}

impl Default for PartsApiConfig {
    fn default() -> Self {
        Self {
            url: default_parts_url(),
            api_key: String::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content).map_err(|e| {
                crate::BrickscanError::Config(format!("Failed to parse config: {}", e))
            })?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"vision": {"model": "partnet-large"}}"#).unwrap();
        assert_eq!(config.vision.model, "partnet-large");
        assert_eq!(config.vision.url, default_vision_url());
        assert_eq!(config.vision.max_concurrent, 4);
        assert_eq!(config.database.path, "brickscan.db");
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.vision.retries = 7;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.vision.retries, 7);
        assert_eq!(loaded.images.dir, "crops");
    }

    #[test]
    fn test_absent_file_loads_defaults() {
        let loaded = AppConfig::load(Path::new("/no/such/config.json")).unwrap();
        assert_eq!(loaded.vision.url, default_vision_url());
    }
}
