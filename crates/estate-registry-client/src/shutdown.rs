//! Process-level shutdown wiring.
//!
//! Every way a service process can end funnels into one task that
//! de-registers and then exits:
//!
//! | Trigger                          | Exit status |
//! |----------------------------------|-------------|
//! | SIGINT / SIGTERM / SIGQUIT       | 0           |
//! | panic anywhere in the process    | 1           |
//! | [`ShutdownHandle::fatal`]        | 1           |
//! | `run_service` future returns Err | 1           |

use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::process::ExitCode;
use std::sync::{Arc, Once};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::registry_client::RegistryClient;

/// Where the process-wide panic hook sends fatal reasons.
static PANIC_ROUTE: Mutex<Option<mpsc::UnboundedSender<ShutdownReason>>> =
    parking_lot::const_mutex(None);
static PANIC_HOOK: Once = Once::new();

/// Why the process is going down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The service's main future finished normally.
    Completed,
    /// A termination signal, by name.
    Signal(&'static str),
    /// An unrecoverable error.
    Fatal(String),
}

impl ShutdownReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Completed | ShutdownReason::Signal(_) => 0,
            ShutdownReason::Fatal(_) => 1,
        }
    }
}

/// Handle to the installed shutdown task.
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<ShutdownReason>,
    task_handle: JoinHandle<()>,
}

impl ShutdownHandle {
    /// Requests a fatal shutdown (de-register, exit 1).
    pub fn fatal(&self, message: impl Into<String>) {
        let _ = self.tx.send(ShutdownReason::Fatal(message.into()));
    }

    /// Stops watching without shutting down.
    pub fn abort(self) {
        self.task_handle.abort();
    }
}

/// Installs signal handlers and a panic hook that de-register `client`
/// before the process exits.
///
/// Must be called from within a tokio runtime. The previous panic hook still
/// runs, so panic messages are printed as usual.
///
/// Meant to be called once per process. The panic hook is installed only
/// once; calling this again moves panic routing to the newest handle.
pub fn install_shutdown_handlers(client: Arc<RegistryClient>) -> ShutdownHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();

    route_panics_to(tx.clone());

    let task_handle = tokio::spawn(async move {
        let reason = tokio::select! {
            name = wait_for_signal() => ShutdownReason::Signal(name),
            Some(reason) = rx.recv() => reason,
        };

        let code = handle_shutdown(&client, reason).await;
        std::process::exit(code);
    });

    ShutdownHandle { tx, task_handle }
}

fn route_panics_to(tx: mpsc::UnboundedSender<ShutdownReason>) {
    *PANIC_ROUTE.lock() = Some(tx);

    PANIC_HOOK.call_once(|| {
        let previous_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            report_fatal(format!("panic: {}", panic_info));
            previous_hook(panic_info);
        }));
    });
}

/// Sends a fatal reason to the current shutdown task. False if none listens.
fn report_fatal(message: String) -> bool {
    match PANIC_ROUTE.lock().as_ref() {
        Some(tx) => tx.send(ShutdownReason::Fatal(message)).is_ok(),
        None => false,
    }
}

/// Runs the shutdown for `reason` and returns the exit status to use.
pub async fn handle_shutdown(client: &RegistryClient, reason: ShutdownReason) -> i32 {
    match &reason {
        ShutdownReason::Completed => info!("Service finished, shutting down"),
        ShutdownReason::Signal(name) => info!("Received {}, shutting down", name),
        ShutdownReason::Fatal(message) => error!("Fatal error, shutting down: {}", message),
    }

    if let Err(e) = client.shutdown().await {
        error!("Shutdown did not complete cleanly: {}", e);
    }

    reason.exit_code()
}

/// Awaits the service's main future, then shuts the client down.
///
/// An `Err` from `service` is treated as fatal. Use the returned
/// [`ExitCode`] as `main`'s return value.
pub async fn run_service<F, E>(client: Arc<RegistryClient>, service: F) -> ExitCode
where
    F: Future<Output = std::result::Result<(), E>>,
    E: Display,
{
    let code = serve_then_shutdown(&client, service).await;
    ExitCode::from(code as u8)
}

async fn serve_then_shutdown<F, E>(client: &RegistryClient, service: F) -> i32
where
    F: Future<Output = std::result::Result<(), E>>,
    E: Display,
{
    let reason = match service.await {
        Ok(()) => ShutdownReason::Completed,
        Err(e) => ShutdownReason::Fatal(e.to_string()),
    };

    handle_shutdown(client, reason).await
}

async fn wait_for_signal() -> &'static str {
    use tokio::signal;

    #[cfg(unix)]
    {
        match unix_signal_streams() {
            Ok((mut sigint, mut sigterm, mut sigquit)) => {
                tokio::select! {
                    _ = sigint.recv() => "SIGINT",
                    _ = sigterm.recv() => "SIGTERM",
                    _ = sigquit.recv() => "SIGQUIT",
                }
            }
            Err(e) => {
                error!("Failed to install signal handlers: {}, falling back to Ctrl+C", e);
                let _ = signal::ctrl_c().await;
                "Ctrl+C"
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        "Ctrl+C"
    }
}

#[cfg(unix)]
fn unix_signal_streams() -> std::io::Result<(
    tokio::signal::unix::Signal,
    tokio::signal::unix::Signal,
    tokio::signal::unix::Signal,
)> {
    use tokio::signal::unix::{signal, SignalKind};

    Ok((
        signal(SignalKind::interrupt())?,
        signal(SignalKind::terminate())?,
        signal(SignalKind::quit())?,
    ))
}
