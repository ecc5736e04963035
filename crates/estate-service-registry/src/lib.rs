//! # Estate Service Registry
//!
//! Registry server for dynamic service discovery across the estate platform.
//!
//! This crate provides:
//! - The [`ServiceStorage`] abstraction with in-memory (DashMap) and Redis backends
//! - [`Registry`]: registration, expiry sweep, version-aware lookup, random selection
//! - HTTP API for registering, de-registering and finding services (axum)
//! - Standalone server executable (`estate-registry`)

pub mod api;
pub mod clock;
pub mod config;
pub mod registry;
pub mod server;
pub mod storage;
pub mod validation;
pub mod version;

// Re-export commonly used items
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RegistryConfig, ServerOptions, StorageConfig};
pub use registry::Registry;
pub use server::{BoundRegistryServer, RegistryServer};
pub use storage::{MemoryStorage, RedisStorage, ServiceStorage};
pub use version::VersionRange;
