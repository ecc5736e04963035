//! # Estate Registry Client
//!
//! Everything a service process needs to take part in discovery:
//!
//! - [`RegistryClient`]: register with retry/backoff, heartbeat, de-register
//!   on shutdown
//! - [`install_shutdown_handlers`] / [`run_service`]: route signals, panics
//!   and fatal errors through that shutdown
//! - [`ServiceClient`]: resolve a service by name and version range, then
//!   call it over HTTP
//!
//! ```rust,no_run
//! use estate_registry_client::{
//!     install_shutdown_handlers, RegistrationOptions, RegistryClient, RegistryClientConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> estate_common::Result<()> {
//! let config = RegistryClientConfig::from_env()?;
//! let client = Arc::new(RegistryClient::new(&config));
//!
//! client
//!     .register_and_send_heartbeat(RegistrationOptions::new("listings", "1.4.0", "10.0.0.4", 4001))
//!     .await?;
//! install_shutdown_handlers(Arc::clone(&client));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod http;
pub mod registry_client;
pub mod service_client;
pub mod shutdown;

// Re-export commonly used items
pub use api::{HttpRegistryApi, RegistryApi};
pub use config::{RegistrationOptions, RegistryClientConfig};
pub use registry_client::{LifecycleState, RegistryClient};
pub use service_client::{ServiceClient, ServiceClientOptions, ServiceRequest, ServiceResponse};
pub use shutdown::{install_shutdown_handlers, run_service, ShutdownHandle, ShutdownReason};

pub use estate_common::{Error, Result, ServiceRecord, UnregisteredService};
