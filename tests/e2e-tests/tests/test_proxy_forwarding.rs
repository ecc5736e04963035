//! The reference service host forwarding `/proxy/<service>/<path>` calls.

use axum::http::Method;
use e2e_tests::{TestRegistry, TestService};
use estate_registry_client::http::HttpTransport;
use estate_registry_client::UnregisteredService;
use estate_service_host::{create_router, HostState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn start_gateway(registry: &TestRegistry) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let state = Arc::new(HostState {
        service: UnregisteredService::new("gateway", "1.0.0", "127.0.0.1", addr.port()),
        services: registry.service_client("^1.0.0"),
    });
    let app = create_router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

#[tokio::test]
async fn test_proxy_forwards_request_and_response() {
    let registry = TestRegistry::start().await;
    let listings = TestService::start(&registry, "listings", "1.1.0").await.unwrap();
    let gateway = start_gateway(&registry).await;
    let transport = HttpTransport::new(Duration::from_secs(2));

    let response = transport
        .send_json(
            Method::POST,
            &format!("http://{}/proxy/listings/echo", gateway),
            &json!({"id": 7}),
        )
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.json::<Value>().unwrap(), json!({"id": 7}));

    let response = transport
        .get(&format!("http://{}/proxy/listings/status/418", gateway))
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 418);
    assert_eq!(response.json::<Value>().unwrap(), json!({"detail": "status 418"}));

    listings.stop().await.unwrap();
}

#[tokio::test]
async fn test_proxy_to_missing_service() {
    let registry = TestRegistry::start().await;
    let gateway = start_gateway(&registry).await;
    let transport = HttpTransport::new(Duration::from_secs(2));

    let response = transport
        .get(&format!("http://{}/proxy/unknown-service/anything", gateway))
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 404);
    assert_eq!(
        response.json::<Value>().unwrap(),
        json!({"detail": "No matching service found!"})
    );
}

#[tokio::test]
async fn test_gateway_info_and_health() {
    let registry = TestRegistry::start().await;
    let gateway = start_gateway(&registry).await;
    let transport = HttpTransport::new(Duration::from_secs(2));

    let health = transport.get(&format!("http://{}/health", gateway)).await.unwrap();
    assert_eq!(&health.body[..], b"OK");

    let info: Value = transport
        .get(&format!("http://{}/info", gateway))
        .await
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(info["name"], "gateway");
    assert_eq!(info["port"], gateway.port());
}
