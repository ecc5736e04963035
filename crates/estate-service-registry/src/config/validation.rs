use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &RegistryConfig) -> Result<()> {
    validate_server_options(&config.server)?;
    validate_storage_config(&config.storage)?;
    validate_log_level(&config.log_level)
}

/// Validate listener options
fn validate_server_options(options: &ServerOptions) -> Result<()> {
    if options.host.trim().is_empty() {
        return Err(anyhow!("Server host cannot be empty"));
    }

    // Port 0 is allowed and means "pick an ephemeral port".
    Ok(())
}

/// Validate the storage backend selection
fn validate_storage_config(storage: &StorageConfig) -> Result<()> {
    match storage {
        StorageConfig::Memory => Ok(()),
        StorageConfig::Redis { url, key_prefix } => {
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return Err(anyhow!(
                    "Redis URL must start with redis:// or rediss://, got: {}",
                    url
                ));
            }
            if key_prefix.is_empty() {
                return Err(anyhow!("Redis key prefix cannot be empty"));
            }
            Ok(())
        }
    }
}

fn validate_log_level(log_level: &str) -> Result<()> {
    match log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            log_level
        )),
    }
}
