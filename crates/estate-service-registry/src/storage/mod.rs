//! Storage backends for the service registry.
//!
//! The registry never talks to a concrete store. It holds an
//! `Arc<dyn ServiceStorage>` and relies on two properties only:
//!
//! - `save` is an upsert keyed by the identity key
//! - `remove` of a missing key is a no-op
//! - `remove_if_unchanged` never deletes a record refreshed after it was read
//!
//! Backends differ in how records expire:
//!
//! | Backend          | Expiry                                        |
//! |------------------|-----------------------------------------------|
//! | [`MemoryStorage`]| none; the registry sweeps on every read       |
//! | [`RedisStorage`] | per-key TTL set at write time; sweep is a no-op |
//!
//! Adding a backend means implementing [`ServiceStorage`] and extending
//! [`build_storage`].

use async_trait::async_trait;
use estate_common::{Result, ServiceRecord};
use std::sync::Arc;

use crate::config::StorageConfig;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStorage;
pub use self::redis::RedisStorage;

/// Persistence contract for service records.
#[async_trait]
pub trait ServiceStorage: Send + Sync {
    /// Returns every record currently held. Backends may already have
    /// dropped expired records; callers must still filter for liveness.
    async fn get_all(&self) -> Result<Vec<ServiceRecord>>;

    /// Inserts or replaces the record with the same identity key.
    async fn save(&self, record: ServiceRecord) -> Result<()>;

    /// Deletes by identity key. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Deletes `record`'s key unless the stored copy has a newer timestamp,
    /// i.e. a heartbeat refreshed it after `record` was read. Returns true
    /// if something was deleted.
    async fn remove_if_unchanged(&self, record: &ServiceRecord) -> Result<bool>;

    /// Removes all records.
    async fn clear(&self) -> Result<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Creates the backend selected by `config`.
pub async fn build_storage(config: &StorageConfig) -> Result<Arc<dyn ServiceStorage>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageConfig::Redis { url, key_prefix } => {
            let storage = RedisStorage::connect_with_prefix(url, key_prefix).await?;
            Ok(Arc::new(storage))
        }
    }
}
