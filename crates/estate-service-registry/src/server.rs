//! Service registry server implementation.
//!
//! Binding and serving are separate steps so callers (tests, the service
//! host) can learn the ephemeral port before traffic starts:
//!
//! ```rust,no_run
//! # async fn demo() -> estate_common::Result<()> {
//! use estate_service_registry::{RegistryConfig, RegistryServer};
//!
//! let server = RegistryServer::from_config(&RegistryConfig::default()).await?;
//! let server = server.bind("127.0.0.1:0".parse().unwrap()).await?;
//! println!("listening on {}", server.local_addr()?);
//! server.run().await
//! # }
//! ```

use crate::{
    api::create_router,
    config::RegistryConfig,
    registry::Registry,
    storage::{build_storage, ServiceStorage},
};
use axum::Router;
use estate_common::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Service registry server.
pub struct RegistryServer {
    registry: Arc<Registry>,
    router: Router,
}

/// A registry server holding a bound listener.
pub struct BoundRegistryServer {
    registry: Arc<Registry>,
    router: Router,
    listener: TcpListener,
}

impl RegistryServer {
    /// Creates a server over an existing registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        let router = create_router(Arc::clone(&registry));
        Self { registry, router }
    }

    /// Creates a server over the given storage backend.
    pub fn with_storage(storage: Arc<dyn ServiceStorage>) -> Self {
        Self::new(Arc::new(Registry::new(storage)))
    }

    /// Builds the configured storage backend and wraps it in a server.
    pub async fn from_config(config: &RegistryConfig) -> Result<Self> {
        let storage = build_storage(&config.storage).await?;
        info!("Using {} storage backend", storage.backend_name());
        Ok(Self::with_storage(storage))
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Binds a TCP listener. Port 0 picks an ephemeral port.
    pub async fn bind(self, addr: SocketAddr) -> Result<BoundRegistryServer> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind registry to {}: {}", addr, e);
            Error::Io(e)
        })?;

        Ok(BoundRegistryServer {
            registry: self.registry,
            router: self.router,
            listener,
        })
    }
}

impl BoundRegistryServer {
    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Serves until the process is stopped.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.listener.local_addr()?;
        info!("✅ Registry listening on http://{}", addr);

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| {
            error!("Registry server error: {}", e);
            Error::Io(e)
        })?;

        info!("Registry on {} stopped", addr);
        Ok(())
    }
}
