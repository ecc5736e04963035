//! Standalone service registry server.
//!
//! ```text
//! estate-registry                              # memory backend on 0.0.0.0:3000
//! estate-registry --port 4000 --storage redis --redis-url redis://cache/
//! estate-registry --config registry.yaml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use estate_service_registry::{RegistryConfig, RegistryServer, StorageConfig};
use tracing::info;

/// Estate service registry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "REGISTRY_PORT")]
    port: Option<u16>,

    /// Storage backend (overrides config)
    #[arg(long, value_enum, env = "REGISTRY_STORAGE")]
    storage: Option<Backend>,

    /// Redis URL, used with `--storage redis`
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Memory,
    Redis,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;
    initialize_logging(args.debug, &config.log_level);

    info!("Starting estate service registry");

    let addr = config.bind_address()?;
    let server = RegistryServer::from_config(&config)
        .await
        .context("Failed to initialize storage")?
        .bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Press Ctrl+C to stop");
    server.run_until(setup_signal_handlers()).await?;

    info!("Registry shut down");
    Ok(())
}

fn load_config(args: &Args) -> Result<RegistryConfig> {
    let mut config = match &args.config {
        Some(path) => RegistryConfig::load_from_file(path)?,
        None => RegistryConfig::default(),
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }

    match (args.storage, &args.redis_url) {
        (Some(Backend::Memory), _) => config.storage = StorageConfig::Memory,
        (Some(Backend::Redis), Some(url)) => config.storage = StorageConfig::redis(url),
        (Some(Backend::Redis), None) => {
            if !matches!(config.storage, StorageConfig::Redis { .. }) {
                anyhow::bail!("--storage redis requires --redis-url or REDIS_URL");
            }
        }
        (None, Some(url)) => {
            if let StorageConfig::Redis { url: current, .. } = &mut config.storage {
                *current = url.clone();
            }
        }
        (None, None) => {}
    }

    config.validate()?;
    Ok(config)
}

fn initialize_logging(debug: bool, configured_level: &str) {
    let level = if debug { "debug" } else { configured_level };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

async fn setup_signal_handlers() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let (mut sigterm, mut sigint) = match (
            signal::unix::signal(signal::unix::SignalKind::terminate()),
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                tracing::warn!("Failed to install unix signal handlers, falling back to Ctrl+C");
                let _ = signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}
