//! Registry domain logic.
//!
//! The registry owns no state of its own. Every operation goes through the
//! injected [`ServiceStorage`], and every read is preceded by an expiry sweep
//! so a record older than [`TIMEOUT`] is never handed out:
//!
//! ```text
//! register(s)     sweep -> save(record{timestamp: now})      -> echo s
//! unregister(s)   remove(identity_key(s))                    -> echo s
//! get(name, r)    sweep -> live records -> name == && version satisfies r
//!                        -> pick one uniformly at random
//! get_services()  sweep -> live records
//! ```
//!
//! The registry never retries. Write failures from storage surface unchanged;
//! retrying is the registration client's job. The one exception is the sweep
//! that precedes `register`: a failure there is logged and the registration
//! still goes through.
//!
//! The sweep removes a record only if storage still holds the copy it read.
//! A heartbeat that lands between the read and the delete keeps its record.

use chrono::Duration;
use estate_common::{Result, ServiceRecord, UnregisteredService, TIMEOUT};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::storage::ServiceStorage;
use crate::version::VersionRange;

/// Service bookkeeping over a pluggable storage backend.
#[derive(Clone)]
pub struct Registry {
    storage: Arc<dyn ServiceStorage>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    /// Creates a registry using wall-clock time.
    pub fn new(storage: Arc<dyn ServiceStorage>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    /// Creates a registry with an explicit time source.
    pub fn with_clock(storage: Arc<dyn ServiceStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Returns the storage backend.
    pub fn storage(&self) -> &Arc<dyn ServiceStorage> {
        &self.storage
    }

    /// Registers or refreshes an instance and echoes it back.
    ///
    /// Calling this again with the same identity key only bumps the
    /// timestamp, which is how heartbeats work.
    pub async fn register(&self, service: UnregisteredService) -> Result<UnregisteredService> {
        if let Err(e) = self.clean_up().await {
            warn!(key = %service.identity_key(), error = %e, "Expiry sweep failed before register");
        }

        let record = ServiceRecord::new(service.clone(), self.clock.now());
        self.storage.save(record).await?;

        info!(key = %service.identity_key(), "Registered service");
        Ok(service)
    }

    /// Removes an instance and echoes it back. Unknown instances are not an error.
    pub async fn unregister(&self, service: UnregisteredService) -> Result<UnregisteredService> {
        let key = service.identity_key();
        self.storage.remove(&key).await?;

        info!(key = %key, "Unregistered service");
        Ok(service)
    }

    /// Finds a live instance of `name` whose version satisfies `version_range`.
    ///
    /// When several instances match, one is chosen uniformly at random. An
    /// unparsable range matches nothing.
    pub async fn get(&self, name: &str, version_range: &str) -> Result<Option<ServiceRecord>> {
        let live = self.clean_up().await?;

        let Some(range) = VersionRange::parse(version_range) else {
            debug!(name = %name, range = %version_range, "Ignoring invalid version range");
            return Ok(None);
        };

        let mut candidates: Vec<ServiceRecord> = live
            .into_iter()
            .filter(|record| record.name == name && range.matches_str(&record.version))
            .collect();

        if candidates.is_empty() {
            debug!(name = %name, range = %version_range, "No matching service");
            return Ok(None);
        }

        let index = rand::thread_rng().gen_range(0..candidates.len());
        Ok(Some(candidates.swap_remove(index)))
    }

    /// Returns every live record.
    pub async fn get_services(&self) -> Result<Vec<ServiceRecord>> {
        self.clean_up().await
    }

    /// True if a live record with the same identity key exists.
    pub async fn service_exists(&self, service: &UnregisteredService) -> Result<bool> {
        let key = service.identity_key();
        let live = self.clean_up().await?;
        Ok(live.iter().any(|record| record.identity_key() == key))
    }

    /// Removes every record with `timestamp + TIMEOUT <= now` and returns the
    /// records that survived.
    ///
    /// Safe to call redundantly: removing an already-expired key is a no-op
    /// for every backend. A record refreshed after the read is left alone.
    pub async fn clean_up(&self) -> Result<Vec<ServiceRecord>> {
        let now = self.clock.now();
        let timeout = Duration::from_std(TIMEOUT).unwrap_or_else(|_| Duration::seconds(15));

        let mut live = Vec::new();
        for record in self.storage.get_all().await? {
            if record.timestamp + timeout <= now {
                if self.storage.remove_if_unchanged(&record).await? {
                    debug!(key = %record.identity_key(), "Expired service record");
                } else {
                    debug!(key = %record.identity_key(), "Record refreshed during sweep, kept");
                }
            } else {
                live.push(record);
            }
        }

        Ok(live)
    }
}
