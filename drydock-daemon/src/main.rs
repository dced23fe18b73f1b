//! Drydock daemon
//!
//! Long-running maintenance service for Docker Desktop on WSL.
//!
//! Startup:
//! - Configuration: load settings from environment with defaults, validate
//! - Event log: tracing plus the plain log file, startup marker
//! - Scheduler: one run at startup, then daily at the configured time
//!
//! Ctrl-C (and SIGTERM on Unix) stops the scheduler. A run in progress is
//! allowed to finish restoring the host before the process exits. On Unix,
//! SIGHUP requests an immediate run.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drydock_daemon::config::Config;
use drydock_daemon::context::MaintenanceContext;
use drydock_daemon::scheduler::ScheduleHandle;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drydock_daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Drydock daemon");

    let config = load_config()?;
    info!(
        "Loaded configuration: maintenance_time={}, kernel_service={}, log_file={}",
        config.maintenance_time.format("%H:%M"),
        config.kernel_service,
        config.log_file.display()
    );

    let context = MaintenanceContext::new(config);
    context.write_startup_marker();
    context.events.info("Service started");
    context.events.info(&format!(
        "Current PATH: {}",
        std::env::var("PATH").unwrap_or_default()
    ));

    let scheduler = context.scheduler();
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));
    tokio::spawn(kick_on_hangup(scheduler.handle()));

    let final_state = scheduler.run(cancel).await;
    if let Some(last_run) = final_state.last_run {
        info!("Last maintenance run: {}", last_run.summary);
    }

    context.events.info("Service stopped");
    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Cancels `cancel` on the first shutdown signal
async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                    _ = terminate.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;

    info!("Stop requested; shutting down after the current step");
    cancel.cancel();
}

/// Triggers an immediate run on every SIGHUP
#[cfg(unix)]
async fn kick_on_hangup(handle: ScheduleHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!("Failed to install SIGHUP handler: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("Received SIGHUP; requesting maintenance run");
        handle.trigger_now();
    }
}

#[cfg(not(unix))]
async fn kick_on_hangup(_handle: ScheduleHandle) {}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
