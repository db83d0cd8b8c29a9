pub mod utils;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use common::event_bus::{spawn_dispatcher, EventBus, EventListener};

use crate::ServiceState;

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle for gracefully shutting down the repair worker.
pub struct ShutdownHandle {
    graceful_waiter: tokio::task::JoinHandle<()>,
    handles: Vec<tokio::task::JoinHandle<()>>,
    shutdown_tx: watch::Sender<()>,
}

impl ShutdownHandle {
    /// Block until the worker shuts down (via signal or explicit shutdown).
    pub async fn wait(self) {
        shutdown_and_join(self.graceful_waiter, self.handles).await;
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("replication is disabled, there is nothing to repair")]
    ReplicationDisabled,

    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),
}

/// Initialize logging and the panic handler.
///
/// Console output goes to stderr so it never mixes with command output.
/// Returns guards that must be kept alive for the duration of the program.
pub fn init_logging(
    log_level: tracing::Level,
    log_dir: Option<&Path>,
) -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;

    let mut guards = Vec::new();

    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    guards.push(stderr_guard);

    let stderr_env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stderr_writer)
        .with_filter(stderr_env_filter);

    if let Some(log_dir) = log_dir {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Failed to create log directory {:?}: {}",
                log_dir, e
            );
        }

        let file_appender = tracing_appender::rolling::daily(log_dir, "postblob.log");
        let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        guards.push(file_guard);

        let file_env_filter = EnvFilter::builder()
            .with_default_directive(log_level.into())
            .from_env_lossy();

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(file_env_filter);

        let _ = tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry().with(stderr_layer).try_init();
    }

    utils::register_panic_logger();

    guards
}

/// Wait for shutdown and join all handles with timeout.
async fn shutdown_and_join(
    graceful_waiter: tokio::task::JoinHandle<()>,
    handles: Vec<tokio::task::JoinHandle<()>>,
) {
    let _ = graceful_waiter.await;

    if timeout(FINAL_SHUTDOWN_TIMEOUT, join_all(handles))
        .await
        .is_err()
    {
        tracing::error!(
            "Failed to shut down within {} seconds",
            FINAL_SHUTDOWN_TIMEOUT.as_secs()
        );
        std::process::exit(4);
    }
}

/// Spawn the repair dispatcher over the durable queue of `state`.
///
/// The returned `ShutdownHandle` stops it on SIGINT/SIGTERM or on request.
pub fn start_repair_worker(state: &ServiceState) -> Result<ShutdownHandle, ProcessError> {
    let listener: Arc<dyn EventListener> = state
        .repair_listener()
        .ok_or(ProcessError::ReplicationDisabled)?
        .clone();
    let bus: Arc<dyn EventBus> = state.event_bus().clone();

    let (graceful_waiter, shutdown_tx, shutdown_rx) = utils::graceful_shutdown_blocker()?;
    utils::report_build_info();

    let handle = spawn_dispatcher(bus, listener, state.poll_interval(), shutdown_rx);
    tracing::info!(
        poll_interval_ms = state.poll_interval().as_millis() as u64,
        "repair worker running"
    );

    Ok(ShutdownHandle {
        graceful_waiter,
        handles: vec![handle],
        shutdown_tx,
    })
}

/// Runs the repair worker until a shutdown signal is received.
pub async fn spawn_repair_worker(state: &ServiceState) -> Result<(), ProcessError> {
    let handle = start_repair_worker(state)?;
    handle.wait().await;
    Ok(())
}
