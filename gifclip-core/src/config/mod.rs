//! Configuration types for gifclip
//!
//! [`ConfigFile`] is the on-disk TOML layout; [`CaptureConfig`] is the
//! validated runtime view the orchestrator consumes.

mod file;

pub use file::{
    sample_config, ConfigFile, CountdownSettings, DisplayEntry, EncodingSettings,
    HotkeySettings, RecordingSettings, SelectionSettings, UploadSettings,
};

pub use crate::encoder::QualityTier;

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::countdown::MAX_COUNTDOWN_SECS;
use crate::encoder::{MAX_COLORS, MIN_COLORS};
use crate::error::{ClipError, Result};
use crate::process::resolve_ffmpeg;

/// Accepted countdown lengths in seconds
pub const COUNTDOWN_RANGE: RangeInclusive<u32> = 0..=MAX_COUNTDOWN_SECS;

/// Accepted recording frame rates
pub const FPS_RANGE: RangeInclusive<u32> = 5..=30;

/// Accepted maximum recording durations in seconds
pub const MAX_DURATION_RANGE: RangeInclusive<u32> = 5..=60;

/// Accepted GIF palette sizes
pub const COLORS_RANGE: RangeInclusive<u16> = MIN_COLORS..=MAX_COLORS;

/// Default upload service
pub const DEFAULT_API_URL: &str = "https://gif-api.cartergrove.me";

/// Where finished GIFs go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum UploadTarget {
    /// Keep the GIF on disk only
    Local,
    /// Upload to the sharing service
    Remote { api_url: String, timeout_secs: u64 },
}

impl UploadTarget {
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Local => Duration::ZERO,
            Self::Remote { timeout_secs, .. } => Duration::from_secs(*timeout_secs),
        }
    }
}

impl Default for UploadTarget {
    fn default() -> Self {
        Self::Remote {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Key bindings owned by the host's hotkey registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyBindings {
    pub start_capture: String,
    pub stop_capture: String,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            start_capture: "CommandOrControl+Shift+G".to_string(),
            stop_capture: "Escape".to_string(),
        }
    }
}

/// Complete capture session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Countdown before recording, whole seconds
    pub countdown_secs: u32,
    /// Recording frame rate
    pub fps: u32,
    /// Hard cap on recording length, enforced by ffmpeg
    pub max_duration_secs: u32,
    /// GIF palette size
    pub colors: u16,
    /// GIF quality tier
    pub quality: QualityTier,
    /// Explicit ffmpeg binary
    pub ffmpeg: Option<PathBuf>,
    /// Directory for temporary recordings and GIFs
    pub output_dir: PathBuf,
    /// Upload destination
    pub upload: UploadTarget,
    /// Hotkey bindings (informational for the core)
    pub hotkeys: HotkeyBindings,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            fps: 15,
            max_duration_secs: 30,
            colors: MAX_COLORS,
            quality: QualityTier::default(),
            ffmpeg: None,
            output_dir: std::env::temp_dir(),
            upload: UploadTarget::default(),
            hotkeys: HotkeyBindings::default(),
        }
    }
}

impl CaptureConfig {
    /// Set the countdown length
    pub fn with_countdown(mut self, secs: u32) -> Self {
        self.countdown_secs = secs;
        self
    }

    /// Set the recording frame rate
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the maximum recording duration
    pub fn with_max_duration(mut self, secs: u32) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Set the palette size
    pub fn with_colors(mut self, colors: u16) -> Self {
        self.colors = colors;
        self
    }

    /// Set the quality tier
    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    /// Use a specific ffmpeg binary
    pub fn with_ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(path.into());
        self
    }

    /// Set the working directory for recordings
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the upload destination
    pub fn with_upload(mut self, upload: UploadTarget) -> Self {
        self.upload = upload;
        self
    }

    /// Resolved ffmpeg binary
    pub fn ffmpeg_path(&self) -> PathBuf {
        resolve_ffmpeg(self.ffmpeg.as_deref())
    }

    /// Validate and return an error if the configuration cannot work
    pub fn validate_strict(&self) -> Result<()> {
        check_range("countdown duration", self.countdown_secs, &COUNTDOWN_RANGE)?;
        check_range("frame rate", self.fps, &FPS_RANGE)?;
        check_range("max duration", self.max_duration_secs, &MAX_DURATION_RANGE)?;
        check_range("colors", self.colors, &COLORS_RANGE)?;

        if let UploadTarget::Remote { api_url, .. } = &self.upload {
            if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
                return Err(ClipError::config(format!(
                    "upload.api_url must be an http(s) URL, got '{}'",
                    api_url
                )));
            }
        }

        Ok(())
    }

    /// Validate and return warnings for settings that work but may surprise
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let frames = self.fps * self.max_duration_secs;
        if frames > 900 {
            warnings.push(format!(
                "{}fps for up to {}s is {} frames; the GIF may be very large.",
                self.fps, self.max_duration_secs, frames
            ));
        }

        if self.colors < 64 && self.quality == QualityTier::High {
            warnings.push(format!(
                "Only {} colors with high quality dithering; consider more colors or medium quality.",
                self.colors
            ));
        }

        if !self.output_dir.as_os_str().is_empty() && !Path::new(&self.output_dir).is_dir() {
            warnings.push(format!(
                "Output directory {} does not exist.",
                self.output_dir.display()
            ));
        }

        warnings
    }
}

fn check_range<T>(name: &str, value: T, range: &RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ClipError::config(format!(
            "{} {} is outside {}..={}",
            name,
            value,
            range.start(),
            range.end()
        )))
    }
}
