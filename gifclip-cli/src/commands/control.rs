//! Trigger commands - drive the running daemon over IPC

use anyhow::{Context, Result};
use gifclip_core::ipc::{IpcClient, IpcResponse};

async fn connect() -> Result<IpcClient> {
    IpcClient::connect()
        .await
        .context("Could not reach the gifclip daemon (start it with 'gifclip daemon')")
}

fn report(response: IpcResponse, done: &str) {
    match response {
        IpcResponse::Started { session } => println!("{} started.", session),
        IpcResponse::Ignored { reason } => println!("Ignored: {}", reason),
        _ => println!("{}", done),
    }
}

/// Start a capture session (bind this to a hotkey)
pub async fn start() -> Result<()> {
    let response = connect().await?.start().await.context("Start failed")?;
    report(response, "Capture started.");
    Ok(())
}

/// Cancel the active session
pub async fn cancel() -> Result<()> {
    let response = connect().await?.cancel().await.context("Cancel failed")?;
    report(response, "Cancel requested.");
    Ok(())
}

/// Finish the active recording early
pub async fn finish() -> Result<()> {
    let response = connect().await?.finish().await.context("Finish failed")?;
    report(response, "Finishing recording.");
    Ok(())
}

/// Stop the daemon
pub async fn shutdown() -> Result<()> {
    connect()
        .await?
        .shutdown()
        .await
        .context("Shutdown failed")?;
    println!("Daemon stopping.");
    Ok(())
}
