use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use anyhow::{Context, Result};

use crate::storage::redis::DEFAULT_KEY_PREFIX;

pub mod validation;

/// Top-level registry configuration
///
/// ```yaml
/// server:
///   host: 0.0.0.0
///   port: 3000
/// storage:
///   backend: redis
///   url: redis://127.0.0.1/
/// log_level: info
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub server: ServerOptions,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP listener options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerOptions {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage backend selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Single-process DashMap store
    #[default]
    Memory,
    /// Shared Redis store with per-key TTL
    Redis {
        url: String,
        #[serde(default = "default_key_prefix")]
        key_prefix: String,
    },
}

impl RegistryConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: RegistryConfig = serde_yaml::from_str(content)
            .context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Socket address the server binds to
    pub fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!("Invalid bind address: {}:{}", self.server.host, self.server.port)
            })
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            server: ServerOptions::default(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl StorageConfig {
    /// Redis storage with the default key prefix
    pub fn redis(url: impl Into<String>) -> Self {
        StorageConfig::Redis {
            url: url.into(),
            key_prefix: default_key_prefix(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RegistryConfig::load_from_string("{}").unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_redis_backend() {
        let yaml = r#"
server:
  port: 4000
storage:
  backend: redis
  url: redis://127.0.0.1:6379/
"#;
        let config = RegistryConfig::load_from_string(yaml).unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.storage, StorageConfig::redis("redis://127.0.0.1:6379/"));
        assert_eq!(config.bind_address().unwrap().port(), 4000);
    }

    #[test]
    fn test_custom_key_prefix() {
        let yaml = r#"
storage:
  backend: redis
  url: redis://cache/
  key_prefix: "staging:services:"
"#;
        let config = RegistryConfig::load_from_string(yaml).unwrap();

        match config.storage {
            StorageConfig::Redis { key_prefix, .. } => assert_eq!(key_prefix, "staging:services:"),
            other => panic!("Expected redis backend, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let yaml = "storage:\n  backend: etcd\n";
        assert!(RegistryConfig::load_from_string(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  host: 127.0.0.1\n  port: 3100\nlog_level: debug").unwrap();

        let config = RegistryConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.bind_address().unwrap().to_string(), "127.0.0.1:3100");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_missing_file() {
        let err = RegistryConfig::load_from_file("/nonexistent/registry.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
