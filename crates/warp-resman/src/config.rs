//! Configuration for a resource cache

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Resource cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name attached to every log line and event of this cache
    pub name: String,

    /// Number of content buckets to pre-allocate in the registry
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "resman".to_string(),
            initial_capacity: 64,
        }
    }
}

impl CacheConfig {
    /// Create a default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the initial registry capacity
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.name, "resman");
        assert_eq!(config.initial_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::new()
            .with_name("textures")
            .with_initial_capacity(1024);
        assert_eq!(config.name, "textures");
        assert_eq!(config.initial_capacity, 1024);
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = CacheConfig::new().with_name("  ");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"name": "shaders"}"#).unwrap();
        assert_eq!(config.name, "shaders");
        assert_eq!(config.initial_capacity, 64);
    }
}
