//! Core domain types used throughout the discovery subsystem.
//!
//! A service instance is identified by the quadruple
//! `name :: version :: host :: port`, not by a surrogate id. Registering the
//! same quadruple again refreshes the existing record instead of adding one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Liveness window: a record is live while `now - timestamp <= TIMEOUT`.
pub const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

/// Builds the identity key for a service instance.
///
/// # Example
/// ```
/// use estate_common::identity_key;
///
/// assert_eq!(identity_key("listings", "1.2.3", "10.0.0.4", 4001), "listings::1.2.3::10.0.0.4::4001");
/// ```
pub fn identity_key(name: &str, version: &str, host: &str, port: u16) -> String {
    format!("{}::{}::{}::{}", name, version, host, port)
}

/// Caller-supplied part of a registration.
///
/// Used as the body of register/de-register requests. `timestamp` and
/// `instance` are assigned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnregisteredService {
    /// Logical service name, shared by all instances.
    pub name: String,

    /// Exact semantic version of this instance.
    pub version: String,

    /// Host the instance is reachable on.
    pub host: String,

    /// Port the instance is listening on.
    pub port: u16,
}

impl UnregisteredService {
    /// Creates a new UnregisteredService.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            host: host.into(),
            port,
        }
    }

    /// Returns the identity key of this instance.
    pub fn identity_key(&self) -> String {
        identity_key(&self.name, &self.version, &self.host, self.port)
    }
}

impl fmt::Display for UnregisteredService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({}:{})", self.name, self.version, self.host, self.port)
    }
}

/// A registered, timestamped service instance.
///
/// `timestamp` is the last refresh (registration or heartbeat) and is
/// serialized as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Opaque instance identifier, possibly empty.
    #[serde(default)]
    pub instance: String,
}

impl ServiceRecord {
    /// Creates a record for `service` refreshed at `now`, with an empty instance id.
    pub fn new(service: UnregisteredService, now: DateTime<Utc>) -> Self {
        Self {
            name: service.name,
            version: service.version,
            host: service.host,
            port: service.port,
            timestamp: now,
            instance: String::new(),
        }
    }

    /// Returns the identity key of this record.
    pub fn identity_key(&self) -> String {
        identity_key(&self.name, &self.version, &self.host, self.port)
    }

    /// True while `now - timestamp <= TIMEOUT`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp <= liveness_window()
    }

    /// Base URL of the instance, e.g. `http://10.0.0.4:4001`.
    ///
    /// IPv6 literals are bracketed: `::1` gives `http://[::1]:4001`.
    pub fn base_url(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(ip) => format!("http://{}", SocketAddr::new(ip, self.port)),
            Err(_) => format!("http://{}:{}", self.host, self.port),
        }
    }

    /// Strips server-assigned fields.
    pub fn to_unregistered(&self) -> UnregisteredService {
        UnregisteredService::new(&self.name, &self.version, &self.host, self.port)
    }
}

fn liveness_window() -> Duration {
    Duration::from_std(TIMEOUT).unwrap_or_else(|_| Duration::seconds(15))
}

/// Body of a `POST /find` request. `version` may be a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindRequest {
    pub name: String,
    pub version: String,
}

/// Body of a `GET /services` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesResponse {
    pub results: Vec<ServiceRecord>,
}
