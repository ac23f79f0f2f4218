//! CLI command implementations

mod config;
mod control;
mod daemon;
mod info;
mod record;
mod status;

pub use config::{config, ConfigArgs};
pub use control::{cancel, finish, shutdown, start};
pub use daemon::daemon;
pub use info::info;
pub use record::{record, RecordArgs};
pub use status::{status, StatusArgs};

use anyhow::{Context, Result};
use gifclip_core::config::{CaptureConfig, ConfigFile};
use gifclip_core::orchestrator::{SessionOutcome, SessionReport, UploadResult};

/// Load the config file and its validated runtime view
fn load_config() -> Result<(ConfigFile, CaptureConfig)> {
    let file = ConfigFile::load().context("Failed to load configuration")?;
    let capture = file
        .capture_config()
        .context("Invalid configuration")?;
    Ok((file, capture))
}

/// Print a finished session for humans
fn print_report(report: &SessionReport) {
    match &report.outcome {
        SessionOutcome::Completed { artifact, upload } => {
            println!("GIF saved: {}", artifact.display());
            match upload {
                UploadResult::Uploaded(receipt) => {
                    println!("URL:       {}", receipt.url);
                    if let Some(cdn) = &receipt.cdn_url {
                        println!("Direct:    {}", cdn);
                    }
                }
                UploadResult::Failed { message } => {
                    println!("Upload failed: {}", message);
                }
            }
        }
        SessionOutcome::Cancelled { stage } => {
            println!("Capture cancelled during {}.", stage);
        }
        SessionOutcome::Failed { stage, failure } => {
            println!("Capture failed during {}: {}", stage, failure.message);
            if let Some(diagnostics) = failure.diagnostics.as_deref().filter(|d| !d.is_empty()) {
                println!("ffmpeg output:\n{}", diagnostics);
            }
        }
    }
    println!("Elapsed:   {:.1}s", report.elapsed_ms as f64 / 1000.0);
}
