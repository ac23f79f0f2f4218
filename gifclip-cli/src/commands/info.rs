//! Info command - show ffmpeg availability and effective settings

use anyhow::Result;
use gifclip_core::config::{ConfigFile, UploadTarget};
use gifclip_core::ipc::{daemon_running, socket_path};
use gifclip_core::process::{ffmpeg_version, FFMPEG_ENV};
use gifclip_core::recorder::CaptureBackend;

/// Show system information
pub async fn info() -> Result<()> {
    println!("gifclip - System Information\n");

    let file = ConfigFile::load_or_default();
    let config = match file.capture_config() {
        Ok(config) => Some(config),
        Err(e) => {
            println!("Configuration error: {}", e);
            if let Some(hint) = e.user_hint() {
                println!("  Hint: {}", hint);
            }
            println!();
            None
        }
    };

    println!("ffmpeg:");
    let ffmpeg = config
        .as_ref()
        .map(|c| c.ffmpeg_path())
        .unwrap_or_else(|| gifclip_core::process::resolve_ffmpeg(None));
    println!("  Binary:  {}", ffmpeg.display());
    match ffmpeg_version(&ffmpeg).await {
        Some(version) => println!("  [OK] {}", version),
        None => {
            println!("  [!!] ffmpeg did not run");
            println!("  Install ffmpeg, set {}, or set recording.ffmpeg in config.toml", FFMPEG_ENV);
        }
    }
    println!();

    println!("Capture:");
    println!("  Backend: {}", CaptureBackend::host());
    let displays = file.display_layout();
    if displays.is_empty() {
        println!("  Displays: none configured");
    } else {
        for display in &displays {
            println!("  {}", display);
        }
    }
    if let Ok(Some(region)) = file.fixed_region() {
        println!("  Region:  {}", region);
    }
    println!();

    if let Some(config) = &config {
        println!("Settings:");
        println!("  Countdown:    {}s", config.countdown_secs);
        println!("  Frame rate:   {} fps", config.fps);
        println!("  Max duration: {}s", config.max_duration_secs);
        println!("  Quality:      {} ({} colors)", config.quality, config.colors);
        println!("  Output dir:   {}", config.output_dir.display());
        match &config.upload {
            UploadTarget::Local => println!("  Upload:       disabled"),
            UploadTarget::Remote { api_url, .. } => println!("  Upload:       {}", api_url),
        }
        println!("  Hotkeys:      start={} stop={}", config.hotkeys.start_capture, config.hotkeys.stop_capture);

        let warnings = config.validate();
        if !warnings.is_empty() {
            println!();
            println!("Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
        println!();
    }

    println!("Daemon:");
    println!("  Socket:  {}", socket_path().display());
    let running = daemon_running().await;
    println!(
        "  {} {}",
        if running { "[OK]" } else { "[--]" },
        if running { "running" } else { "not running" }
    );

    Ok(())
}
