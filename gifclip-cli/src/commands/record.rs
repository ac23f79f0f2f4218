//! Record command - run one capture session in the foreground

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use gifclip_core::config::UploadTarget;
use gifclip_core::orchestrator::{CaptureDependencies, CaptureOrchestrator, SessionOutcome};
use gifclip_core::types::Bounds;
use gifclip_core::upload::uploader_for;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::debug;

use super::{load_config, print_report};
use crate::surface::{display_layout, TerminalSurface};

/// Arguments for the record command
#[derive(Args)]
pub struct RecordArgs {
    /// Region to capture as X,Y,WxH in global coordinates (default: [selection] region, else the first display)
    #[arg(short, long)]
    region: Option<Bounds>,

    /// Countdown seconds (0-10)
    #[arg(short, long)]
    countdown: Option<u32>,

    /// Frames per second (5-30)
    #[arg(short, long)]
    fps: Option<u32>,

    /// Maximum recording length in seconds (5-60)
    #[arg(short = 't', long)]
    max_duration: Option<u32>,

    /// Keep the GIF on disk instead of uploading it
    #[arg(long)]
    no_upload: bool,
}

/// Run one capture session
pub async fn record(args: RecordArgs) -> Result<()> {
    let (file, mut config) = load_config()?;

    if let Some(countdown) = args.countdown {
        config = config.with_countdown(countdown);
    }
    if let Some(fps) = args.fps {
        config = config.with_fps(fps);
    }
    if let Some(max_duration) = args.max_duration {
        config = config.with_max_duration(max_duration);
    }
    if args.no_upload {
        config = config.with_upload(UploadTarget::Local);
    }

    let region = match args.region {
        Some(region) => Some(region),
        None => file.fixed_region()?,
    };
    let displays = display_layout(file.display_layout(), region);

    let deps = CaptureDependencies {
        surface: Arc::new(TerminalSurface::new(displays, region)),
        uploader: uploader_for(&config.upload)?,
    };
    let orchestrator = CaptureOrchestrator::new(config, deps).context("Invalid settings")?;

    println!("gifclip - Record\n");
    println!("  Frame rate:   {} fps", orchestrator.config().fps);
    println!("  Max duration: {}s", orchestrator.config().max_duration_secs);
    println!(
        "  Quality:      {} ({} colors)",
        orchestrator.config().quality,
        orchestrator.config().colors
    );
    println!();

    let runner = orchestrator.clone();
    let mut session = tokio::spawn(async move { runner.run_once().await });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let report = loop {
        tokio::select! {
            joined = &mut session => {
                break joined.context("Capture task panicked")??;
            }
            _ = signal::ctrl_c() => {
                println!("\nCancelling...");
                let _ = orchestrator.cancel();
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    if orchestrator.finish_recording().unwrap_or(false) {
                        println!("Finishing...");
                    }
                }
                Ok(None) | Err(_) => {
                    debug!("stdin closed");
                    stdin_open = false;
                }
            }
        }
    };

    println!();
    print_report(&report);

    if let SessionOutcome::Failed { failure, .. } = &report.outcome {
        anyhow::bail!("{}", failure.message);
    }
    Ok(())
}
