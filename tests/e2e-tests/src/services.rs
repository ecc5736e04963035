//! Downstream services that register themselves with a [`TestRegistry`].

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use estate_registry_client::{
    LifecycleState, RegistrationOptions, RegistryClient, Result, UnregisteredService,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::TestRegistry;

/// Heartbeat period used by test services.
pub const TEST_HEARTBEAT: Duration = Duration::from_secs(1);

/// A running downstream service and its registration client.
pub struct TestService {
    pub service: UnregisteredService,
    pub client: Arc<RegistryClient>,
    task_handle: JoinHandle<()>,
}

impl TestService {
    /// Starts an HTTP service and registers it as `name@version`.
    ///
    /// Routes:
    /// - `GET /whoami` -> `{name, version, port}`
    /// - `POST /echo` -> request body, with `x-echo-header` copied back
    /// - `GET /status/:code` -> that status with `{"detail": "status <code>"}`
    pub async fn start(registry: &TestRegistry, name: &str, version: &str) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let service = UnregisteredService::new(name, version, "127.0.0.1", addr.port());

        let app = router(service.clone());
        let task_handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = Arc::new(RegistryClient::new(&registry.client_config()));
        let options = RegistrationOptions::new(name, version, "127.0.0.1", addr.port())
            .with_retries(3, Duration::from_millis(50))
            .with_interval(TEST_HEARTBEAT);
        client.register_and_send_heartbeat(options).await?;

        Ok(Self {
            service,
            client,
            task_handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.service.port))
    }

    pub fn state(&self) -> LifecycleState {
        self.client.state()
    }

    /// De-registers, then stops serving.
    pub async fn stop(self) -> Result<()> {
        let result = self.client.shutdown().await;
        self.task_handle.abort();
        result
    }

    /// Stops serving and heartbeating without de-registering, like a crash.
    pub fn crash(self) {
        self.task_handle.abort();
        drop(self.client);
    }
}

fn router(service: UnregisteredService) -> Router {
    Router::new()
        .route("/whoami", get(whoami))
        .route("/echo", post(echo))
        .route("/status/:code", get(status))
        .with_state(Arc::new(service))
}

async fn whoami(State(service): State<Arc<UnregisteredService>>) -> Json<Value> {
    Json(json!({
        "name": service.name,
        "version": service.version,
        "port": service.port,
    }))
}

async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> (HeaderMap, Json<Value>) {
    let mut reply = HeaderMap::new();
    if let Some(value) = headers.get("x-echo-header") {
        reply.insert("x-echo-header", value.clone());
    }
    (reply, Json(body))
}

async fn status(Path(code): Path<u16>) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"detail": format!("status {}", code)})))
}
