//! Calling services by name and the shape of every failure.

use axum::http::Method;
use e2e_tests::{TestRegistry, TestService};
use estate_common::Error;
use estate_registry_client::http::HttpTransport;
use estate_registry_client::ServiceRequest;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_call_service_round_trip() {
    let registry = TestRegistry::start().await;
    let listings = TestService::start(&registry, "listings", "1.4.0").await.unwrap();
    let client = registry.service_client("^1.0.0");

    let whoami: Value = client
        .call_service("listings", ServiceRequest::get("/whoami"), None)
        .await
        .unwrap();
    assert_eq!(whoami, json!({"name": "listings", "version": "1.4.0", "port": listings.service.port}));

    let response = client
        .call_service_with_response(
            "listings",
            ServiceRequest::post("/echo")
                .header("x-echo-header", "kept")
                .json(&json!({"query": "2 bedrooms"})),
            Some("~1.4"),
        )
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.headers.get("x-echo-header").unwrap(), "kept");
    assert_eq!(response.json::<Value>().unwrap(), json!({"query": "2 bedrooms"}));

    listings.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_service_is_404() {
    let registry = TestRegistry::start().await;
    let client = registry.service_client("^1.0.0");

    let err = client
        .call_service::<Value>("unknown-service", ServiceRequest::get("/"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ServiceNotFound { .. }));
    assert_eq!(err.status(), 404);
    assert_eq!(err.payload(), json!({"detail": "No matching service found!"}));
}

#[tokio::test]
async fn test_downstream_status_and_body_pass_through() {
    let registry = TestRegistry::start().await;
    let listings = TestService::start(&registry, "listings", "1.0.0").await.unwrap();
    let client = registry.service_client("1.0.0");

    let err = client
        .call_service::<Value>("listings", ServiceRequest::get("/status/503"), None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), 503);
    assert_eq!(err.payload(), json!({"detail": "status 503"}));

    listings.stop().await.unwrap();
}

#[tokio::test]
async fn test_registry_rejects_malformed_registration() {
    let registry = TestRegistry::start().await;
    let transport = HttpTransport::new(Duration::from_secs(2));

    let response = transport
        .send_json(
            Method::PUT,
            &format!("{}/register", registry.url()),
            &json!({"name": "", "version": "one", "port": "abc"}),
        )
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 400);
    let body: Value = response.json().unwrap();
    assert_eq!(body["errors"]["name"], "name is required");
    assert_eq!(body["errors"]["port"], "port must be a number");
}

#[tokio::test]
async fn test_registration_without_host_uses_peer_address() {
    let registry = TestRegistry::start().await;
    let transport = HttpTransport::new(Duration::from_secs(2));

    let response = transport
        .send_json(
            Method::PUT,
            &format!("{}/register", registry.url()),
            &json!({"name": "billing", "version": "1.0.0", "port": 4100}),
        )
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 200);
    let echoed: Value = response.json().unwrap();
    assert_eq!(echoed["host"], "127.0.0.1");
    assert_eq!(echoed["port"], 4100);
}
