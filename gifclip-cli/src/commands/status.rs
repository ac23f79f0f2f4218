//! Status command - show the daemon's session state

use anyhow::{Context, Result};
use clap::Args;
use gifclip_core::ipc::{daemon_running, IpcClient};

use super::print_report;

/// Arguments for the status command
#[derive(Args)]
pub struct StatusArgs {
    /// Print raw JSON
    #[arg(long)]
    json: bool,
}

/// Show status of the running daemon
pub async fn status(args: StatusArgs) -> Result<()> {
    if !daemon_running().await {
        println!("gifclip daemon is not running.");
        println!("Start it with: gifclip daemon");
        return Ok(());
    }

    let status = IpcClient::connect()
        .await?
        .status()
        .await
        .context("Failed to query daemon status")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("gifclip - Status\n");
    println!("  Daemon PID: {}", status.pid);
    println!("  Uptime:     {}s", status.uptime_seconds);
    println!("  State:      {}", status.state);

    if let Some(session) = &status.session {
        println!();
        println!("Active session {}:", session.id);
        if let Some(region) = &session.region {
            println!("  Region:     {}", region);
        }
        if let Some(path) = &session.recording_path {
            println!("  Recording:  {}", path.display());
        }
        println!("  Elapsed:    {:.1}s", session.elapsed_ms as f64 / 1000.0);
        if session.cancel_requested {
            println!("  (cancel requested)");
        }
    }

    if let Some(last) = &status.last_session {
        println!();
        println!("Last session {}:", last.id);
        print_report(last);
    }

    Ok(())
}
