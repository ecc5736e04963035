//! Request body validation for the registry HTTP surface.
//!
//! Bodies are parsed as loose JSON first so that every problem can be
//! reported per field, instead of failing on the first serde error:
//!
//! ```json
//! { "errors": { "name": "name is required", "port": "port must be a number" } }
//! ```

use estate_common::{Error, FindRequest, Result, UnregisteredService};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::version::parse_version;

/// Host recorded when the body omits one and the peer address is unknown.
pub const FALLBACK_HOST: &str = "127.0.0.1";

/// How strictly to check the `version` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRule {
    /// Must be an exact semantic version (registration).
    Exact,
    /// Any non-empty string (de-registration).
    Any,
}

/// Validates a register/de-register body.
///
/// `peer_host` is used when the body has no `host`.
pub fn parse_service(
    body: &[u8],
    peer_host: Option<String>,
    version_rule: VersionRule,
) -> Result<UnregisteredService> {
    let object = parse_object(body)?;
    let mut errors = BTreeMap::new();

    let name = required_string(&object, "name", &mut errors);
    let version = required_string(&object, "version", &mut errors);
    let port = required_port(&object, &mut errors);
    let host = optional_string(&object, "host", &mut errors);

    if let (Some(version), VersionRule::Exact) = (&version, version_rule) {
        if parse_version(version).is_none() {
            errors.insert(
                "version".to_string(),
                "version must be a valid semantic version".to_string(),
            );
        }
    }

    match (name, version, port) {
        (Some(name), Some(version), Some(port)) if errors.is_empty() => {
            let host = host
                .or(peer_host)
                .unwrap_or_else(|| FALLBACK_HOST.to_string());
            Ok(UnregisteredService::new(name, version, host, port))
        }
        _ => Err(Error::validation_map(errors)),
    }
}

/// Validates a find body. `version` may be a range.
pub fn parse_find(body: &[u8]) -> Result<FindRequest> {
    let object = parse_object(body)?;
    let mut errors = BTreeMap::new();

    let name = required_string(&object, "name", &mut errors);
    let version = required_string(&object, "version", &mut errors);

    match (name, version) {
        (Some(name), Some(version)) => Ok(FindRequest { name, version }),
        _ => Err(Error::validation_map(errors)),
    }
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(Error::validation("body", "request body must be a JSON object")),
        Err(e) => Err(Error::validation("body", format!("invalid JSON: {}", e))),
    }
}

fn required_string(
    object: &Map<String, Value>,
    field: &str,
    errors: &mut BTreeMap<String, String>,
) -> Option<String> {
    match object.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            errors.insert(field.to_string(), format!("{} is required", field));
            None
        }
        Some(_) => {
            errors.insert(field.to_string(), format!("{} must be a string", field));
            None
        }
    }
}

fn optional_string(
    object: &Map<String, Value>,
    field: &str,
    errors: &mut BTreeMap<String, String>,
) -> Option<String> {
    match object.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(_) => {
            errors.insert(field.to_string(), format!("{} must be a string", field));
            None
        }
    }
}

fn required_port(
    object: &Map<String, Value>,
    errors: &mut BTreeMap<String, String>,
) -> Option<u16> {
    let raw = match object.get("port") {
        None | Some(Value::Null) => {
            errors.insert("port".to_string(), "port is required".to_string());
            return None;
        }
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };

    match raw {
        Some(port) if (1..=u64::from(u16::MAX)).contains(&port) => Some(port as u16),
        Some(_) => {
            errors.insert("port".to_string(), "port must be between 1 and 65535".to_string());
            None
        }
        None => {
            errors.insert("port".to_string(), "port must be a number".to_string());
            None
        }
    }
}
