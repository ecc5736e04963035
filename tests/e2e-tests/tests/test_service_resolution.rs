//! Name and version-range resolution through the registry's HTTP surface.

use e2e_tests::{TestRegistry, TestService};
use serde_json::json;
use std::collections::HashSet;

#[tokio::test]
async fn test_resolves_by_version_range() {
    let registry = TestRegistry::start().await;
    let v1 = TestService::start(&registry, "listings", "1.2.0").await.unwrap();
    let v2 = TestService::start(&registry, "listings", "2.0.0").await.unwrap();
    let client = registry.service_client("^1.0.0");

    let found = client.get_service("listings", None).await.unwrap();
    assert_eq!(found.port, v1.service.port);

    let found = client.get_service("listings", Some("^2")).await.unwrap();
    assert_eq!(found.port, v2.service.port);

    let found = client.get_service("listings", Some(">=1.0.0 <1.3.0 || 9.x")).await.unwrap();
    assert_eq!(found.version, "1.2.0");

    let err = client.get_service("listings", Some("^3.0.0")).await.unwrap_err();
    assert_eq!(err.status(), 404);
    assert_eq!(err.payload(), json!({"detail": "No matching service found!"}));

    v1.stop().await.unwrap();
    v2.stop().await.unwrap();
}

#[tokio::test]
async fn test_spreads_lookups_across_instances() {
    let registry = TestRegistry::start().await;
    let mut instances = Vec::new();
    for _ in 0..3 {
        instances.push(TestService::start(&registry, "search", "1.0.0").await.unwrap());
    }
    let client = registry.service_client("1.0.0");

    let mut seen = HashSet::new();
    for _ in 0..200 {
        seen.insert(client.get_service("search", None).await.unwrap().port);
    }

    let expected: HashSet<u16> = instances.iter().map(|s| s.service.port).collect();
    assert_eq!(seen, expected);

    for instance in instances {
        instance.stop().await.unwrap();
    }
}
