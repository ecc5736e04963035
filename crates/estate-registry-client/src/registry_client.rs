//! Registration lifecycle for one service instance.
//!
//! ```text
//! Idle ──register_and_send_heartbeat──▶ Registering ──ok──▶ Active ──shutdown──▶ ShuttingDown ──▶ Deregistered
//!  ▲                                        │
//!  └──────────── retries exhausted ─────────┘
//! ```
//!
//! While `Active` a background task re-registers every `interval`. A failed
//! heartbeat is retried once and otherwise only logged: the registry keeps
//! the record until its liveness timeout, so a single miss is harmless.

use estate_common::{Error, Result, UnregisteredService};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{HttpRegistryApi, RegistryApi};
use crate::config::{RegistrationOptions, RegistryClientConfig};

/// Where the client is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Registering,
    Active,
    ShuttingDown,
    Deregistered,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "Idle",
            LifecycleState::Registering => "Registering",
            LifecycleState::Active => "Active",
            LifecycleState::ShuttingDown => "ShuttingDown",
            LifecycleState::Deregistered => "Deregistered",
        };
        f.write_str(name)
    }
}

struct Heartbeat {
    cancel: CancellationToken,
    task_handle: JoinHandle<()>,
}

#[derive(Default)]
struct Lifecycle {
    service: Option<UnregisteredService>,
    heartbeat: Option<Heartbeat>,
}

/// Keeps one instance registered and removes it on shutdown.
///
/// Construct once at startup and share behind an `Arc`.
pub struct RegistryClient {
    api: Arc<dyn RegistryApi>,
    state: RwLock<LifecycleState>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    root_cancel: CancellationToken,
}

impl RegistryClient {
    /// Client talking to the registry over HTTP.
    pub fn new(config: &RegistryClientConfig) -> Self {
        Self::with_api(Arc::new(HttpRegistryApi::new(config)))
    }

    /// Client over any registry implementation.
    pub fn with_api(api: Arc<dyn RegistryApi>) -> Self {
        Self {
            api,
            state: RwLock::new(LifecycleState::Idle),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::default()),
            root_cancel: CancellationToken::new(),
        }
    }

    pub fn api(&self) -> &Arc<dyn RegistryApi> {
        &self.api
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    /// The registered service, once registration succeeded.
    pub async fn service(&self) -> Option<UnregisteredService> {
        self.lifecycle.lock().await.service.clone()
    }

    fn set_state(&self, state: LifecycleState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        debug!("Registry client state: {} -> {}", previous, state);
    }

    /// Registers with exponential backoff, then starts the heartbeat.
    ///
    /// Attempt `n` that fails is followed by a wait of
    /// `initial_retry_delay * 2^(n-1)`. After `retries` failures the client
    /// returns to `Idle` and [`Error::RegistrationFailed`] is returned.
    pub async fn register_and_send_heartbeat(
        &self,
        options: RegistrationOptions,
    ) -> Result<UnregisteredService> {
        let mut lifecycle = self.lifecycle.lock().await;

        let current = self.state();
        if current != LifecycleState::Idle {
            return Err(Error::invalid_state(LifecycleState::Idle.to_string(), current.to_string()));
        }
        options.validate()?;

        self.set_state(LifecycleState::Registering);
        let service = options.service();
        info!("Registering {} with the registry", service);

        let attempts = options.retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.api.register(&service).await {
                Ok(_) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    let delay = options.backoff_delay(attempt);
                    warn!(
                        "Registration attempt {}/{} for {} failed: {} (retrying in {:?})",
                        attempt, attempts, service, e, delay
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        if let Some(last_error) = last_error {
            error!("Giving up registering {} after {} attempt(s)", service, attempts);
            self.set_state(LifecycleState::Idle);
            return Err(Error::RegistrationFailed {
                attempts,
                last_error: Box::new(last_error),
            });
        }

        let cancel = self.root_cancel.child_token();
        let task_handle = tokio::spawn(Self::run_heartbeat_loop(
            Arc::clone(&self.api),
            service.clone(),
            options.interval,
            cancel.clone(),
        ));

        lifecycle.service = Some(service.clone());
        lifecycle.heartbeat = Some(Heartbeat { cancel, task_handle });
        self.set_state(LifecycleState::Active);

        info!("✅ Registered {} (heartbeat every {:?})", service, options.interval);
        Ok(service)
    }

    /// Heartbeat loop (runs in background task)
    async fn run_heartbeat_loop(
        api: Arc<dyn RegistryApi>,
        service: UnregisteredService,
        period: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Heartbeat for {} stopped", service);
                    break;
                }
                _ = ticker.tick() => {
                    match api.register(&service).await {
                        Ok(_) => debug!("💓 Heartbeat sent for {}", service),
                        Err(e) => {
                            warn!("Heartbeat for {} failed: {}, retrying once", service, e);
                            if let Err(e) = api.register(&service).await {
                                warn!("Heartbeat retry for {} failed: {}", service, e);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Stops the heartbeat and de-registers.
    ///
    /// Idempotent: once a shutdown has completed, further calls return
    /// `Ok(())` without touching the registry. A de-registration failure is
    /// logged and returned, but the client still ends up `Deregistered`.
    pub async fn shutdown(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        match self.state() {
            LifecycleState::Deregistered => return Ok(()),
            LifecycleState::Idle => {
                self.set_state(LifecycleState::Deregistered);
                return Ok(());
            }
            _ => {}
        }

        self.set_state(LifecycleState::ShuttingDown);

        if let Some(heartbeat) = lifecycle.heartbeat.take() {
            heartbeat.cancel.cancel();
            if let Err(e) = heartbeat.task_handle.await {
                warn!("Heartbeat task ended abnormally: {}", e);
            }
        }

        let result = match &lifecycle.service {
            Some(service) => {
                info!("De-registering {}", service);
                match self.api.deregister(service).await {
                    Ok(_) => {
                        info!("De-registered {}", service);
                        Ok(())
                    }
                    Err(e) => {
                        error!("Failed to de-register {}: {}", service, e);
                        Err(e)
                    }
                }
            }
            None => Ok(()),
        };

        self.set_state(LifecycleState::Deregistered);
        result
    }
}

impl Drop for RegistryClient {
    fn drop(&mut self) {
        self.root_cancel.cancel();
    }
}
