//! Redis storage implementation.
//!
//! Each record lives under its own key,
//! `<prefix><name>::<version>::<host>::<port>`, written with `SET .. EX 15`.
//! Redis expires stale instances by itself, so several registry processes can
//! share one Redis without coordinating sweeps. Concurrent writers only ever
//! overwrite each other on an exact identity-key match, which is the intended
//! upsert.
//!
//! Reads fail closed: if Redis is unreachable `get_all` logs and returns an
//! empty list. Writes propagate their error.
//!
//! The namespace is walked with `SCAN .. MATCH` so listing never blocks the
//! server. The sweep's conditional delete runs as a Lua script that compares
//! the stored timestamp, so a heartbeat landing mid-sweep is never deleted.

use async_trait::async_trait;
use estate_common::{Error, Result, ServiceRecord, TIMEOUT};
use redis::aio::ConnectionManager;
use redis::RedisResult;
use tracing::{debug, error, warn};

use super::ServiceStorage;

/// Default key namespace for live service records.
pub const DEFAULT_KEY_PREFIX: &str = "service:version:live-services:";

/// `COUNT` hint for each `SCAN` page.
const SCAN_BATCH: usize = 100;

/// Deletes KEYS[1] only if its stored timestamp is <= ARGV[1] (epoch ms).
const REMOVE_IF_UNCHANGED_SCRIPT: &str = r"
local current = redis.call('GET', KEYS[1])
if not current then
  return 0
end
if cjson.decode(current)['timestamp'] <= tonumber(ARGV[1]) then
  return redis.call('DEL', KEYS[1])
end
return 0
";

/// Redis-backed record store.
pub struct RedisStorage {
    /// Redis connection manager (reconnects transparently)
    connection_manager: ConnectionManager,

    /// Key prefix for record keys
    key_prefix: String,

    /// Hard TTL applied to every write, in seconds
    ttl_secs: u64,

    conditional_delete: redis::Script,
}

impl RedisStorage {
    /// Connects using the default key prefix.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_prefix(url, DEFAULT_KEY_PREFIX).await
    }

    /// Connects with a custom key prefix.
    pub async fn connect_with_prefix(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Config(format!("Failed to create Redis client: {}", e)))?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::storage(format!("Failed to connect to Redis: {}", e)))?;

        let key_prefix = key_prefix.into();
        debug!(prefix = %key_prefix, "Connected Redis storage");

        Ok(Self {
            connection_manager,
            key_prefix,
            ttl_secs: TIMEOUT.as_secs(),
            conditional_delete: redis::Script::new(REMOVE_IF_UNCHANGED_SCRIPT),
        })
    }

    /// Redis key for an identity key.
    fn record_key(&self, identity_key: &str) -> String {
        format!("{}{}", self.key_prefix, identity_key)
    }

    /// Pattern matching every record key in this namespace.
    fn namespace_pattern(&self) -> String {
        format!("{}*", self.key_prefix)
    }

    async fn namespace_keys(&self, conn: &mut ConnectionManager) -> RedisResult<Vec<String>> {
        let pattern = self.namespace_pattern();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await?;
            keys.extend(batch);

            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn fetch_all(&self) -> RedisResult<Vec<ServiceRecord>> {
        let mut conn = self.connection_manager.clone();

        let keys = self.namespace_keys(&mut conn).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.cmd("GET").arg(key);
        }
        let values: Vec<Option<String>> = pipe.query_async(&mut conn).await?;

        let records = keys
            .iter()
            .zip(values)
            // Keys may expire between SCAN and GET.
            .filter_map(|(key, value)| value.map(|json| (key, json)))
            .filter_map(|(key, json)| match serde_json::from_str::<ServiceRecord>(&json) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping malformed service record");
                    None
                }
            })
            .collect();

        Ok(records)
    }
}

#[async_trait]
impl ServiceStorage for RedisStorage {
    async fn get_all(&self) -> Result<Vec<ServiceRecord>> {
        match self.fetch_all().await {
            Ok(records) => Ok(records),
            Err(e) => {
                error!(error = %e, "Failed to read service records from Redis");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, record: ServiceRecord) -> Result<()> {
        let key = self.record_key(&record.identity_key());
        let json = serde_json::to_string(&record)
            .map_err(|e| Error::storage(format!("Failed to serialize service record: {}", e)))?;

        let mut conn = self.connection_manager.clone();
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(&json)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Failed to save service record");
                Error::storage(format!("Failed to save {}: {}", key, e))
            })?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = self.record_key(key);

        let mut conn = self.connection_manager.clone();
        let _: () = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Failed to remove service record");
                Error::storage(format!("Failed to remove {}: {}", key, e))
            })?;

        Ok(())
    }

    async fn remove_if_unchanged(&self, record: &ServiceRecord) -> Result<bool> {
        let key = self.record_key(&record.identity_key());

        let mut conn = self.connection_manager.clone();
        let deleted: i64 = self
            .conditional_delete
            .key(&key)
            .arg(record.timestamp.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Failed to remove expired service record");
                Error::storage(format!("Failed to remove {}: {}", key, e))
            })?;

        Ok(deleted > 0)
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();

        let keys = self.namespace_keys(&mut conn).await.map_err(|e| {
            error!(error = %e, "Failed to list service records for clear");
            Error::storage(format!("Failed to list records: {}", e))
        })?;
        if keys.is_empty() {
            return Ok(());
        }

        let _: () = redis::cmd("DEL")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to clear service records");
                Error::storage(format!("Failed to clear records: {}", e))
            })?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
