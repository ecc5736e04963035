//! Client-side configuration.

use estate_common::{Error, Result, UnregisteredService, TIMEOUT};
use std::time::Duration;

/// Default registry base URL.
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:3000";

/// Default bound on every call to the registry.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How to reach the registry.
#[derive(Clone, Debug)]
pub struct RegistryClientConfig {
    /// Base URL, e.g. `http://registry:3000`
    pub registry_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl RegistryClientConfig {
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            registry_url: registry_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `REGISTRY_URL` and `REGISTRY_TIMEOUT_MS`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("REGISTRY_URL") {
            config.registry_url = url;
        }

        if let Ok(raw) = std::env::var("REGISTRY_TIMEOUT_MS") {
            let millis: u64 = raw.parse().map_err(|_| {
                Error::Config(format!("REGISTRY_TIMEOUT_MS must be an integer, got: {}", raw))
            })?;
            config.timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

/// What to register and how hard to try.
#[derive(Clone, Debug)]
pub struct RegistrationOptions {
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,

    /// Registration attempts before giving up
    pub retries: u32,

    /// Delay after the first failed attempt; doubles after each further failure
    pub initial_retry_delay: Duration,

    /// Heartbeat period. Must stay below the registry's liveness timeout.
    pub interval: Duration,
}

impl RegistrationOptions {
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
            retries: 3,
            initial_retry_delay: Duration::from_secs(1),
            interval: Duration::from_secs(10),
        }
    }

    pub fn with_retries(mut self, retries: u32, initial_retry_delay: Duration) -> Self {
        self.retries = retries;
        self.initial_retry_delay = initial_retry_delay;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The service as sent on the wire.
    pub fn service(&self) -> UnregisteredService {
        UnregisteredService::new(
            self.name.clone(),
            self.version.clone(),
            self.host.clone(),
            self.port,
        )
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_retry_delay.saturating_mul(factor)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "name is required"));
        }
        if self.version.trim().is_empty() {
            return Err(Error::validation("version", "version is required"));
        }
        if self.port == 0 {
            return Err(Error::validation("port", "port must be between 1 and 65535"));
        }
        if self.interval.is_zero() || self.interval >= TIMEOUT {
            return Err(Error::validation(
                "interval",
                format!("heartbeat interval must be between 0 and {:?}", TIMEOUT),
            ));
        }
        Ok(())
    }
}
