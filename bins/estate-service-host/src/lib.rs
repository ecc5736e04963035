//! Reference service host.
//!
//! A minimal service that takes part in discovery: it registers itself,
//! reports its own record and forwards `/proxy/<service>/<path>` to whatever
//! instance `<service>` resolves to.

use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use estate_registry_client::{Error, ServiceClient, ServiceRequest, UnregisteredService};
use std::sync::Arc;
use tracing::{info, warn};

/// Header that overrides the version range used to resolve a proxied call.
pub const VERSION_HEADER: &str = "x-service-version";

/// Hop-by-hop headers that are not forwarded in either direction.
const HOP_BY_HOP: &[&str] = &["host", "connection", "transfer-encoding", "keep-alive", "upgrade"];

/// Shared handler state.
pub struct HostState {
    pub service: UnregisteredService,
    pub services: ServiceClient,
}

/// Creates the host router.
pub fn create_router(state: Arc<HostState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/proxy/:service/*path", any(proxy_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn info_handler(State(state): State<Arc<HostState>>) -> Json<UnregisteredService> {
    Json(state.service.clone())
}

/// Forwards the request and copies status, headers and body back.
async fn proxy_handler(
    State(state): State<Arc<HostState>>,
    Path((service, path)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let version = headers
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let target = match query {
        Some(query) => format!("/{}?{}", path, query),
        None => format!("/{}", path),
    };
    info!(service = %service, path = %target, "Proxying {} request", method);

    let request = ServiceRequest::new(method, target)
        .headers(strip_hop_by_hop(headers))
        .body(body);

    let response = state
        .services
        .call_service_with_response(&service, request, version.as_deref())
        .await?;

    let mut forwarded = Response::new(Body::from(response.body));
    *forwarded.status_mut() = response.status;
    *forwarded.headers_mut() = strip_hop_by_hop(response.headers);
    Ok(forwarded)
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    headers.remove(VERSION_HEADER);
    headers
}

/// Renders a client error with its own status and payload.
#[derive(Debug)]
pub struct ProxyError(pub Error);

impl From<Error> for ProxyError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        warn!("Proxy error: {} - {}", status, self.0);
        (status, Json(self.0.payload())).into_response()
    }
}
