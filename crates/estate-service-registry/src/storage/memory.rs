//! In-process storage backed by a DashMap keyed by identity key.
//!
//! Suitable for a single registry process only. No TTL is enforced here;
//! expired records stay until the registry's sweep removes them.

use async_trait::async_trait;
use dashmap::DashMap;
use estate_common::{Result, ServiceRecord};
use std::sync::Arc;
use tracing::debug;

use super::ServiceStorage;

/// Thread-safe in-memory record store.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    records: Arc<DashMap<String, ServiceRecord>>,
}

impl MemoryStorage {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, live or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ServiceStorage for MemoryStorage {
    async fn get_all(&self) -> Result<Vec<ServiceRecord>> {
        Ok(self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn save(&self, record: ServiceRecord) -> Result<()> {
        let key = record.identity_key();
        if self.records.insert(key.clone(), record).is_some() {
            debug!(key = %key, "Refreshed service record");
        } else {
            debug!(key = %key, "Stored new service record");
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.records.remove(key).is_some() {
            debug!(key = %key, "Removed service record");
        }
        Ok(())
    }

    async fn remove_if_unchanged(&self, record: &ServiceRecord) -> Result<bool> {
        let key = record.identity_key();
        let removed = self
            .records
            .remove_if(&key, |_, current| current.timestamp <= record.timestamp)
            .is_some();
        if removed {
            debug!(key = %key, "Removed service record");
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        self.records.clear();
        debug!("Cleared all service records");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
