//! Reference service host executable.
//!
//! ```text
//! estate-service-host --name listings --version 1.4.0 --port 4001 --registry-url http://localhost:3000
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use estate_registry_client::{
    install_shutdown_handlers, run_service, RegistrationOptions, RegistryClient,
    RegistryClientConfig, ServiceClient, ServiceClientOptions,
};
use estate_service_host::{create_router, HostState};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Estate service host
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
struct Args {
    /// Logical service name to register under
    #[arg(long)]
    name: String,

    /// Exact semantic version of this instance
    #[arg(long, default_value = "1.0.0")]
    version: String,

    /// Host other services should use to reach this instance
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 picks one)
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Registry base URL
    #[arg(long, env = "REGISTRY_URL", default_value = "http://localhost:3000")]
    registry_url: String,

    /// Registry request timeout in milliseconds
    #[arg(long, env = "REGISTRY_TIMEOUT_MS", default_value_t = 5000)]
    registry_timeout_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    initialize_logging(args.debug);

    match start(args).await {
        Ok(exit) => exit,
        Err(e) => {
            error!("Service host failed to start: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn start(args: Args) -> Result<ExitCode> {
    let listener = TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("Failed to bind port {}", args.port))?;
    let port = listener.local_addr()?.port();

    let config = RegistryClientConfig::new(&args.registry_url)
        .with_timeout(Duration::from_millis(args.registry_timeout_ms));
    let options = RegistrationOptions::new(&args.name, &args.version, &args.host, port);

    let client = Arc::new(RegistryClient::new(&config));
    let service = client
        .register_and_send_heartbeat(options)
        .await
        .context("Registration failed")?;
    install_shutdown_handlers(Arc::clone(&client));

    let state = Arc::new(HostState {
        service,
        services: ServiceClient::new(
            &config,
            ServiceClientOptions::for_version(&args.version),
        ),
    });
    let app = create_router(state);

    info!("🚀 {}@{} serving on port {}", args.name, args.version, port);

    let serve = async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await
    };
    Ok(run_service(client, serve).await)
}

fn initialize_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}
