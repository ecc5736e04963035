//! Error types for the service discovery subsystem.
//!
//! Every failure that can cross a process boundary is expressed as one
//! [`Error`] value. Each variant knows the HTTP status it maps to and the
//! JSON payload a caller should see, so the registry's HTTP layer, the
//! registration client and the service client all report failures in the same
//! shape:
//!
//! ```text
//! Validation        -> 400 {"errors": {"name": "name is required"}}
//! ServiceNotFound   -> 404 {"detail": "No matching service found!"}
//! Http              -> <downstream status> <downstream body>
//! Transport         -> 500 {"detail": "<raw message>"}
//! ```
//!
//! # Example
//! ```
//! use estate_common::{Error, Result};
//!
//! fn lookup() -> Result<()> {
//!     Err(Error::service_not_found("listings", "^1.0.0"))
//! }
//!
//! let err = lookup().unwrap_err();
//! assert_eq!(err.status(), 404);
//! assert_eq!(err.payload()["detail"], "No matching service found!");
//! ```

use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Detail message returned when no live instance matches a lookup.
pub const SERVICE_NOT_FOUND_DETAIL: &str = "No matching service found!";

/// Result type alias used across the estate crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
///
/// Variants carry enough context to rebuild the wire payload; use
/// [`Error::status`] and [`Error::payload`] rather than matching when all you
/// need is to forward the failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request payload, keyed by field name.
    #[error("Validation failed: {}", describe_fields(.errors))]
    Validation { errors: BTreeMap<String, String> },

    /// No live instance matched the requested name and version range.
    #[error("No matching service found: {name}@{version}")]
    ServiceNotFound { name: String, version: String },

    /// A remote peer answered with a status the caller does not accept.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: Value },

    /// Network failure, timeout or an undecodable response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Storage backend failure on a write path.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Registration gave up after exhausting its retry budget.
    #[error("Registration failed after {attempts} attempt(s): {last_error}")]
    RegistrationFailed {
        attempts: u32,
        last_error: Box<Error>,
    },

    /// Lifecycle operation invoked from the wrong state.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a validation error for a single field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), message.into());
        Self::Validation { errors }
    }

    /// Creates a validation error from a field map.
    pub fn validation_map(errors: BTreeMap<String, String>) -> Self {
        Self::Validation { errors }
    }

    /// Creates a service-not-found error.
    pub fn service_not_found(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Creates an error for an unaccepted HTTP status.
    pub fn http(status: u16, body: Value) -> Self {
        Self::Http { status, body }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// HTTP status code this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::ServiceNotFound { .. } => 404,
            Error::Http { status, .. } => *status,
            Error::InvalidState { .. } => 409,
            Error::RegistrationFailed { .. } => 503,
            Error::Transport(_) | Error::Storage(_) | Error::Config(_) | Error::Io(_) => 500,
        }
    }

    /// Structured JSON payload describing this error.
    pub fn payload(&self) -> Value {
        match self {
            Error::Validation { errors } => json!({ "errors": errors }),
            Error::ServiceNotFound { .. } => json!({ "detail": SERVICE_NOT_FOUND_DETAIL }),
            Error::Http { body, .. } => body.clone(),
            Error::Transport(message) | Error::Storage(message) | Error::Config(message) => {
                json!({ "detail": message })
            }
            other => json!({ "detail": other.to_string() }),
        }
    }

    /// True if this is a resolution failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ServiceNotFound { .. })
    }
}

fn describe_fields(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join(", ")
}
