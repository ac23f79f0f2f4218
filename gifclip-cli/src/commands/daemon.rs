//! Daemon command - own the orchestrator and serve IPC triggers

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gifclip_core::ipc::IpcServer;
use gifclip_core::orchestrator::{CaptureDependencies, CaptureOrchestrator, SessionEvent};
use gifclip_core::upload::uploader_for;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::load_config;
use crate::surface::{display_layout, TerminalSurface};

/// How long shutdown waits for a cancelled session to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Run the capture daemon until Ctrl+C or `gifclip shutdown`
pub async fn daemon() -> Result<()> {
    let (file, config) = load_config()?;
    let region = file.fixed_region()?;
    let displays = display_layout(file.display_layout(), region);

    let deps = CaptureDependencies {
        surface: Arc::new(TerminalSurface::new(displays, region).quiet()),
        uploader: uploader_for(&config.upload)?,
    };
    let orchestrator = CaptureOrchestrator::new(config, deps).context("Invalid settings")?;

    let mut server = IpcServer::new(orchestrator.clone());
    server.start().await.context("Failed to start IPC server")?;

    println!("gifclip daemon listening on {}", server.socket_path().display());
    println!("Bind your capture hotkey to 'gifclip start'. Press Ctrl+C to exit.");

    tokio::spawn(log_events(orchestrator.subscribe()));

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            keep_running = server.accept_one() => {
                if !keep_running? {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                println!("\nReceived interrupt signal...");
                break;
            }
        }
    }

    wind_down(&orchestrator).await;
    println!("Daemon stopped.");
    Ok(())
}

/// Cancel any active session and wait for its report
async fn wind_down(orchestrator: &CaptureOrchestrator) {
    let mut events = orchestrator.subscribe();
    if orchestrator.cancel().is_err() {
        return;
    }

    info!("Waiting for active session to stop");
    let finished = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while orchestrator.is_active() {
            match events.recv().await {
                Ok(SessionEvent::Finished(_)) | Err(broadcast::error::RecvError::Closed) => break,
                _ => {}
            }
        }
    })
    .await;

    if finished.is_err() {
        warn!("Session did not stop within {:?}", SHUTDOWN_GRACE);
    }
}

async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Finished(report)) => {
                info!("{} finished: {:?}", report.id, report.outcome);
            }
            Ok(SessionEvent::StateChanged { session, state }) => {
                info!("{} is {}", session, state);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Event log lagged by {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
