//! autotyped: background Auto-Type daemon
//!
//! Provides:
//! - Global hotkey detection (CGEventTap / low-level keyboard hook)
//! - Explicit Idle/Typing state machine that types the armed entry
//! - IPC server for vault clients (arm entries, trigger, status, events)

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use autotype::config::Config;
use autotype::engine::AutoType;
use autotype::events::AutoTypeEvent;
use autotype::hotkey::{self, HotkeyMonitor};
use autotype::inject;
use autotype::lifecycle::ShutdownSignal;
use autotype::state::{Controller, StateMachine};

#[cfg(unix)]
use autotype::ipc::Server;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "autotyped starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, delay_ms = config.inter_action_delay.as_millis() as u64, "configuration loaded");
    let startup_hotkey = config.hotkey_spec()?;

    let shutdown = ShutdownSignal::new();

    // Hotkey listener -> state machine
    let (hotkey_tx, hotkey_rx) = mpsc::channel(32);
    // Clients -> state machine
    let (command_tx, command_rx) = mpsc::channel(32);
    // State machine -> subscribers
    let (event_tx, mut log_rx) = broadcast::channel::<AutoTypeEvent>(64);

    let engine = Arc::new(AutoType::new(
        inject::platform_injector(),
        config.auto_type_options(),
    ));
    if !engine.is_available() {
        warn!(hint = autotype::permissions::REMEDIATION, "key injection not available yet");
    }

    let monitor = HotkeyMonitor::new(hotkey::platform_backend(), hotkey_tx);
    let mut state_machine = StateMachine::new(monitor, Arc::clone(&engine), event_tx.clone());
    let controller = Controller::new(command_tx);

    let machine_task = tokio::spawn(async move {
        state_machine.run(hotkey_rx, command_rx).await;
    });

    if let Some(spec) = startup_hotkey {
        if let Err(e) = controller.register_hotkey(spec).await {
            error!(error = %e, "failed to register startup hotkey");
            warn!("continuing without hotkey support - clients can register one over IPC");
        }
    }

    #[cfg(unix)]
    let server = Server::new(&config.socket_path, controller.clone(), event_tx.clone())?;

    info!("daemon initialized, entering main loop");

    let event_log = async {
        loop {
            match log_rx.recv().await {
                Ok(event) => info!(%event, "auto-type event"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event log receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    #[cfg(unix)]
    let serve = server.run();
    #[cfg(not(unix))]
    let serve = std::future::pending::<Result<()>>();

    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!(error = %e, "IPC server error");
            }
        }
        _ = event_log => {
            info!("event log exited");
        }
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    engine.cancel();
    #[cfg(unix)]
    server.shutdown().await;

    // Releases the hotkey listener
    controller.shutdown().await;
    if let Err(e) = machine_task.await {
        error!(error = %e, "state machine task failed");
    }

    info!("autotyped stopped");

    Ok(())
}
