// E2E test harness for the estate discovery subsystem
//
// Everything runs in-process over real TCP on 127.0.0.1 with ephemeral ports:
// one registry, any number of downstream services that register themselves.

pub mod assertions;
pub mod registry;
pub mod services;

pub use registry::TestRegistry;
pub use services::TestService;

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Installs a test log subscriber once per test binary. `RUST_LOG` applies.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
