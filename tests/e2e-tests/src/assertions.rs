//! Custom assertions for E2E tests

use estate_common::{ServiceRecord, UnregisteredService};
use std::future::Future;
use std::time::Duration;

use crate::TestRegistry;

/// Assert that the registry lists a live record for `service`
pub async fn assert_registered(
    registry: &TestRegistry,
    service: &UnregisteredService,
) -> Result<ServiceRecord, String> {
    let live = registry
        .registry()
        .get_services()
        .await
        .map_err(|e| e.to_string())?;

    live.iter()
        .find(|record| record.identity_key() == service.identity_key())
        .cloned()
        .ok_or_else(|| format!("{} is not registered. Live records:\n{:#?}", service, live))
}

/// Assert that the registry has no live record for `service`
pub async fn assert_not_registered(
    registry: &TestRegistry,
    service: &UnregisteredService,
) -> Result<(), String> {
    match assert_registered(registry, service).await {
        Ok(record) => Err(format!("{} is still registered: {:?}", service, record)),
        Err(_) => Ok(()),
    }
}

/// Polls `condition` every 50ms until it holds or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(format!("Condition not met within {:?}", timeout));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
