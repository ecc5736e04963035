//! HTTP API handlers using axum.
//!
//! ```text
//! PUT  /register     {name, version, port, host?}  -> echoed service
//! POST /de-register  {name, version, port, host?}  -> echoed service
//! POST /find         {name, version-range}         -> ServiceRecord | 404
//! GET  /services                                   -> {results: [ServiceRecord]}
//! GET  /health                                     -> "OK"
//! ```
//!
//! Handlers are thin: validate, call the [`Registry`], map [`Error`] to a
//! response with its own status and payload.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use estate_common::{Error, ServiceRecord, ServicesResponse, UnregisteredService};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::registry::Registry;
use crate::validation::{parse_find, parse_service, VersionRule};

/// Creates the API router.
pub fn create_router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/register", put(register_handler))
        .route("/de-register", post(deregister_handler))
        .route("/find", post(find_handler))
        .route("/services", get(services_handler))
        .route("/health", get(health_handler))
        .with_state(registry)
}

/// Registers or refreshes a service instance.
async fn register_handler(
    State(registry): State<Arc<Registry>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<UnregisteredService>, ApiError> {
    let service = parse_service(&body, peer_host(connect_info), VersionRule::Exact)?;
    info!(service = %service, "Register request");

    let service = registry.register(service).await?;
    Ok(Json(service))
}

/// Removes a service instance.
async fn deregister_handler(
    State(registry): State<Arc<Registry>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<UnregisteredService>, ApiError> {
    let service = parse_service(&body, peer_host(connect_info), VersionRule::Any)?;
    info!(service = %service, "De-register request");

    let service = registry.unregister(service).await?;
    Ok(Json(service))
}

/// Resolves a name and version range to one live instance.
async fn find_handler(
    State(registry): State<Arc<Registry>>,
    body: Bytes,
) -> Result<Json<ServiceRecord>, ApiError> {
    let find = parse_find(&body)?;
    info!(name = %find.name, version = %find.version, "Find request");

    registry
        .get(&find.name, &find.version)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(Error::service_not_found(find.name, find.version)))
}

/// Lists all live instances.
async fn services_handler(
    State(registry): State<Arc<Registry>>,
) -> Result<Json<ServicesResponse>, ApiError> {
    let results = registry.get_services().await?;
    Ok(Json(ServicesResponse { results }))
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

fn peer_host(connect_info: Option<ConnectInfo<SocketAddr>>) -> Option<String> {
    connect_info.map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
}

/// Error response wrapper.
///
/// Uses [`Error::status`] and [`Error::payload`] so the wire shape is the
/// same one clients decode.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!("API error: {} - {}", status, self.0);
        } else {
            warn!("API error: {} - {}", status, self.0);
        }

        (status, Json(self.0.payload())).into_response()
    }
}
