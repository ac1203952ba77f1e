//! Configuration for the mapping store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the mapping store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base directory for mapping files
    pub data_dir: PathBuf,

    /// Curated mapping file, relative to `data_dir` unless absolute
    pub curated_file: PathBuf,

    /// Cache mapping file, relative to `data_dir` unless absolute
    pub cache_file: PathBuf,

    /// Drop results that would give one secondary ID to several players
    pub one_to_one: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            curated_file: PathBuf::from("player_mapping.json"),
            cache_file: PathBuf::from("player_mapping_cache.json"),
            one_to_one: false,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    /// Get the curated file path
    pub fn curated_path(&self) -> PathBuf {
        self.data_dir.join(&self.curated_file)
    }

    /// Get the cache file path
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.cache_file)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.curated_path() == self.cache_path() {
            return Err("curated and cache files must be different".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let config = StoreConfig::new("/tmp/mappings");
        assert_eq!(config.curated_path(), PathBuf::from("/tmp/mappings/player_mapping.json"));
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/mappings/player_mapping_cache.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_absolute_file_overrides_dir() {
        let config = StoreConfig {
            cache_file: PathBuf::from("/var/cache/mapping.json"),
            ..StoreConfig::new("./data")
        };
        assert_eq!(config.cache_path(), PathBuf::from("/var/cache/mapping.json"));
    }

    #[test]
    fn test_same_file_rejected() {
        let config = StoreConfig { cache_file: PathBuf::from("player_mapping.json"), ..Default::default() };
        assert!(config.validate().is_err());
    }
}
