//! Configuration types for the statskv server

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatsConfig {
    /// Shared secret expected in the `API-KEY` header of write requests
    #[serde(default)]
    pub api_key: String,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Key-value store settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// Server listening configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable access logging
    #[serde(default = "default_true")]
    pub access_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            access_log: true,
        }
    }
}

/// Key-value store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which backend holds the records
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory used by the file backend
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Write a zeroed stats record at startup when none exists yet
    #[serde(default)]
    pub seed_on_empty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            seed_on_empty: false,
        }
    }
}

/// Storage backends for the key-value store
///
/// # Examples
///
/// ```toml
/// [store]
/// backend = "file"  # or "memory"
/// path = "data"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// One file per key inside `store.path`
    #[default]
    File,
    /// Process-local map, lost on restart
    Memory,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_true() -> bool {
    true
}

fn default_store_path() -> String {
    "data".to_string()
}

impl StatsConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Check the settings the server cannot start without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "api_key must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port cannot be 0".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::File && self.store.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "store.path must be set for the file backend".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StatsConfig::default();
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert!(config.server.access_log);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.store.path, "data");
        assert!(!config.store.seed_on_empty);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
api_key = "s3cret"

[server]
bind_address = "127.0.0.1"
port = 3000
access_log = false

[store]
backend = "memory"
seed_on_empty = true
"#;

        let config = StatsConfig::from_toml(toml).unwrap();
        assert_eq!(config.api_key, "s3cret");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert!(!config.server.access_log);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.store.seed_on_empty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = StatsConfig::from_toml("[store]\nbackend = \"redis\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_default_config_needs_api_key() {
        let err = StatsConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert_eq!(err.to_string(), "Validation error: api_key must be set");
    }

    #[test]
    fn test_validate_port_and_path() {
        let mut config = StatsConfig {
            api_key: "key".to_string(),
            ..Default::default()
        };
        config.server.port = 0;
        assert!(config.validate().is_err());

        config.server.port = 8080;
        config.store.path.clear();
        assert!(config.validate().is_err());

        config.store.backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statskv.toml");

        let config = StatsConfig {
            api_key: "round".to_string(),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = StatsConfig::load(&path).unwrap();
        assert_eq!(loaded.api_key, "round");
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.store.backend, config.store.backend);
    }
}
