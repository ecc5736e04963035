//! Registration lifecycle over real HTTP: register, heartbeat, de-register,
//! crash-and-expire, and giving up when the registry is unreachable.

use e2e_tests::assertions::{assert_not_registered, assert_registered, wait_until};
use e2e_tests::{TestRegistry, TestService};
use estate_common::{Error, TIMEOUT};
use estate_registry_client::{
    LifecycleState, RegistrationOptions, RegistryClient, RegistryClientConfig,
};
use estate_service_registry::{ManualClock, MemoryStorage, Registry};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_register_heartbeat_and_deregister() {
    println!("\n========================================");
    println!("TEST: Registration lifecycle");
    println!("========================================\n");

    let registry = TestRegistry::start().await;

    println!("Step 1: Registering listings@1.0.0...");
    let service = TestService::start(&registry, "listings", "1.0.0").await.unwrap();
    assert_eq!(service.state(), LifecycleState::Active);
    let first = assert_registered(&registry, &service.service).await.unwrap();
    println!("✓ Registered at {}\n", first.timestamp);

    println!("Step 2: Waiting for a heartbeat to refresh the record...");
    let (registry_ref, registered, since) = (&registry, &service.service, first.timestamp);
    wait_until(Duration::from_secs(5), || async move {
        assert_registered(registry_ref, registered)
            .await
            .map(|record| record.timestamp > since)
            .unwrap_or(false)
    })
    .await
    .unwrap();
    let listed = registry.service_client("*").get_services().await.unwrap();
    assert_eq!(listed.len(), 1);
    println!("✓ Heartbeat refreshed the timestamp without duplicating\n");

    println!("Step 3: Shutting down...");
    let record = service.service.clone();
    let client = Arc::clone(&service.client);
    service.stop().await.unwrap();
    assert_eq!(client.state(), LifecycleState::Deregistered);
    assert_not_registered(&registry, &record).await.unwrap();

    // A second shutdown is a no-op.
    client.shutdown().await.unwrap();
    println!("✓ De-registered immediately\n");

    registry.stop().await;
}

#[tokio::test]
async fn test_crashed_instance_expires() {
    let clock = Arc::new(ManualClock::starting_now());
    let registry = TestRegistry::start_with_registry(Arc::new(Registry::with_clock(
        Arc::new(MemoryStorage::new()),
        clock.clone(),
    )))
    .await;

    let service = TestService::start(&registry, "listings", "1.0.0").await.unwrap();
    let record = service.service.clone();
    service.crash();

    // Still handed out right up to the end of the liveness window.
    clock.advance(TIMEOUT - Duration::from_millis(100));
    assert_registered(&registry, &record).await.unwrap();

    clock.advance(Duration::from_millis(200));
    assert_not_registered(&registry, &record).await.unwrap();
    let err = registry
        .service_client("1.0.0")
        .get_service("listings", None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_registration_gives_up_when_registry_is_down() {
    let registry = TestRegistry::start().await;
    let config = RegistryClientConfig::new(registry.url()).with_timeout(Duration::from_millis(500));
    registry.stop().await;

    let client = RegistryClient::new(&config);
    let options = RegistrationOptions::new("listings", "1.0.0", "127.0.0.1", 4001)
        .with_retries(3, Duration::from_millis(20));

    let err = client.register_and_send_heartbeat(options).await.unwrap_err();

    match err {
        Error::RegistrationFailed { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("Expected registration failure, got {:?}", other),
    }
    assert_eq!(client.state(), LifecycleState::Idle);
}
