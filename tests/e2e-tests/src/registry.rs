//! In-process registry server.

use estate_registry_client::{RegistryClientConfig, ServiceClient, ServiceClientOptions};
use estate_service_registry::{MemoryStorage, Registry, RegistryServer, ServiceStorage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A registry listening on an ephemeral port. Stops on drop.
pub struct TestRegistry {
    addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

impl TestRegistry {
    /// Starts a registry with in-memory storage.
    pub async fn start() -> Self {
        Self::start_with_storage(Arc::new(MemoryStorage::new())).await
    }

    pub async fn start_with_storage(storage: Arc<dyn ServiceStorage>) -> Self {
        Self::start_with_registry(Arc::new(Registry::new(storage))).await
    }

    /// Serves an existing registry, e.g. one driven by a manual clock.
    pub async fn start_with_registry(registry: Arc<Registry>) -> Self {
        crate::init_logging();

        let server = RegistryServer::new(registry)
            .bind("127.0.0.1:0".parse().expect("valid socket address"))
            .await
            .expect("Failed to bind test registry");
        let addr = server.local_addr().expect("bound address");
        let registry = Arc::clone(server.registry());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task_handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = server.run_until(shutdown).await {
                eprintln!("Test registry stopped with error: {}", e);
            }
        });

        Self {
            addr,
            registry,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Direct access to the registry behind the HTTP surface.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn client_config(&self) -> RegistryClientConfig {
        RegistryClientConfig::new(self.url()).with_timeout(Duration::from_secs(2))
    }

    /// A service client resolving through this registry.
    pub fn service_client(&self, default_version: &str) -> ServiceClient {
        ServiceClient::new(
            &self.client_config(),
            ServiceClientOptions::for_version(default_version),
        )
    }

    /// Stops serving and waits for the server task.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestRegistry {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
