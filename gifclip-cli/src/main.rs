//! gifclip CLI
//!
//! Capture a screen region to a shareable GIF.
//!
//! # Usage
//!
//! ```bash
//! # One capture in the foreground
//! gifclip record --region 100,100,640x480
//!
//! # Background daemon, triggered by a hotkey bound to `gifclip start`
//! gifclip daemon
//! gifclip start
//! gifclip finish
//! ```

mod commands;
mod surface;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// gifclip - region capture to shareable GIFs
#[derive(Parser)]
#[command(name = "gifclip")]
#[command(author = "Carter Grove")]
#[command(version)]
#[command(about = "Capture a screen region to a shareable GIF", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one GIF in the foreground
    Record(commands::RecordArgs),

    /// Run the capture daemon
    Daemon,

    /// Start a capture on the running daemon
    Start,

    /// Cancel the daemon's active capture
    Cancel,

    /// Stop the daemon's recording early and encode it
    Finish,

    /// Show daemon and session status
    Status(commands::StatusArgs),

    /// Stop the daemon
    Shutdown,

    /// Show ffmpeg availability and effective settings
    Info,

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("gifclip={}", level).parse()?),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Record(args) => commands::record(args).await?,
        Commands::Daemon => commands::daemon().await?,
        Commands::Start => commands::start().await?,
        Commands::Cancel => commands::cancel().await?,
        Commands::Finish => commands::finish().await?,
        Commands::Status(args) => commands::status(args).await?,
        Commands::Shutdown => commands::shutdown().await?,
        Commands::Info => commands::info().await?,
        Commands::Config(args) => commands::config(args).await?,
    }

    Ok(())
}
