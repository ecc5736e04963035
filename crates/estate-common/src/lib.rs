//! # Estate Common
//!
//! Types shared by every part of the service discovery subsystem: the
//! registry server, the registration client embedded in each service, and the
//! service client used at call sites.
//!
//! This crate provides:
//! - The unified [`Error`] type (numeric status + structured payload)
//! - Wire types for the registry HTTP surface
//! - The identity-key and liveness rules for service records

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{Error, Result, SERVICE_NOT_FOUND_DETAIL};
pub use types::{
    identity_key, FindRequest, ServiceRecord, ServicesResponse, UnregisteredService, TIMEOUT,
};
