//! Configuration file loading and saving
//!
//! Loads user configuration from `~/.config/gifclip/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{CaptureConfig, HotkeyBindings, QualityTier, UploadTarget, DEFAULT_API_URL};
use crate::error::{ClipError, Result};
use crate::types::{Bounds, Display};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Hotkey bindings
    #[serde(default)]
    pub hotkeys: HotkeySettings,

    /// Countdown settings
    #[serde(default)]
    pub countdown: CountdownSettings,

    /// Screen recording settings
    #[serde(default)]
    pub recording: RecordingSettings,

    /// GIF encoding settings
    #[serde(default)]
    pub encoding: EncodingSettings,

    /// Upload settings
    #[serde(default)]
    pub upload: UploadSettings,

    /// Static display layout for hosts that cannot enumerate monitors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub displays: Vec<DisplayEntry>,

    /// Non-interactive selection
    #[serde(default)]
    pub selection: SelectionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeySettings {
    #[serde(default = "default_start_capture")]
    pub start_capture: String,

    #[serde(default = "default_stop_capture")]
    pub stop_capture: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownSettings {
    /// Seconds before recording starts (0-10)
    #[serde(default = "default_countdown")]
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    /// Frames per second (5-30)
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Maximum recording length in seconds (5-60)
    #[serde(default = "default_max_duration")]
    pub max_duration: u32,

    /// Working directory for recordings (empty = system temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// ffmpeg binary (empty = GIFCLIP_FFMPEG or PATH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingSettings {
    /// Quality tier: low, medium, high
    #[serde(default)]
    pub quality: QualityTier,

    /// Palette size (16-256)
    #[serde(default = "default_colors")]
    pub colors: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Upload finished GIFs; when false they stay on disk
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the sharing service
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

/// One monitor in a static layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayEntry {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_scale")]
    pub scale_factor: f64,
}

impl From<&DisplayEntry> for Display {
    fn from(entry: &DisplayEntry) -> Self {
        Display::new(
            entry.id,
            Bounds::new(entry.x, entry.y, entry.width, entry.height),
            entry.scale_factor,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionSettings {
    /// Fixed region in global coordinates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Bounds>,
}

fn default_start_capture() -> String {
    HotkeyBindings::default().start_capture
}

fn default_stop_capture() -> String {
    HotkeyBindings::default().stop_capture
}

fn default_countdown() -> u32 {
    3
}

fn default_fps() -> u32 {
    15
}

fn default_max_duration() -> u32 {
    30
}

fn default_colors() -> u16 {
    256
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_upload_timeout() -> u64 {
    60
}

fn default_scale() -> f64 {
    1.0
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            start_capture: default_start_capture(),
            stop_capture: default_stop_capture(),
        }
    }
}

impl Default for CountdownSettings {
    fn default() -> Self {
        Self {
            duration: default_countdown(),
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            max_duration: default_max_duration(),
            output_dir: None,
            ffmpeg: None,
        }
    }
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            quality: QualityTier::default(),
            colors: default_colors(),
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_api_url(),
            timeout_secs: default_upload_timeout(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("gifclip").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("gifclip")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/gifclip/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| ClipError::config(format!("Failed to read config file: {}", e)))?;

        let config = Self::parse(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ClipError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ClipError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ClipError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| ClipError::config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Create a default config file if it doesn't exist
    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_path();
        if path.exists() {
            return Ok(false);
        }

        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Build the validated runtime configuration
    pub fn capture_config(&self) -> Result<CaptureConfig> {
        let upload = if self.upload.enabled {
            UploadTarget::Remote {
                api_url: self.upload.api_url.clone(),
                timeout_secs: self.upload.timeout_secs,
            }
        } else {
            UploadTarget::Local
        };

        let config = CaptureConfig {
            countdown_secs: self.countdown.duration,
            fps: self.recording.fps,
            max_duration_secs: self.recording.max_duration,
            colors: self.encoding.colors,
            quality: self.encoding.quality,
            ffmpeg: self.recording.ffmpeg.clone(),
            output_dir: self
                .recording
                .output_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            upload,
            hotkeys: HotkeyBindings {
                start_capture: self.hotkeys.start_capture.clone(),
                stop_capture: self.hotkeys.stop_capture.clone(),
            },
        };

        config.validate_strict()?;
        Ok(config)
    }

    /// Static display layout, if configured
    pub fn display_layout(&self) -> Vec<Display> {
        self.displays.iter().map(Display::from).collect()
    }

    /// Fixed selection region, if configured
    pub fn fixed_region(&self) -> Result<Option<Bounds>> {
        match self.selection.region {
            Some(region) if region.width == 0 || region.height == 0 => Err(ClipError::config(
                format!("selection.region {} has an empty side", region),
            )),
            region => Ok(region),
        }
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# gifclip configuration

[hotkeys]
# Bindings for the host's global shortcut registrar
start_capture = "CommandOrControl+Shift+G"
stop_capture = "Escape"

[countdown]
# Seconds before recording starts (0-10, 0 = start immediately)
duration = 3

[recording]
# Frames per second (5-30)
fps = 15

# Maximum recording length in seconds (5-60)
max_duration = 30

# Working directory for recordings (default: system temp dir)
# output_dir = "/tmp"

# ffmpeg binary (default: $GIFCLIP_FFMPEG, then PATH)
# ffmpeg = "/usr/bin/ffmpeg"

[encoding]
# Quality: low (no dithering), medium (ordered), high (error diffusion)
quality = "high"

# Palette size (16-256)
colors = 256

[upload]
# Upload finished GIFs; when false the GIF stays on disk
enabled = true
api_url = "https://gif-api.cartergrove.me"
timeout_secs = 60

# Static monitor layout for hosts without display enumeration
# [[displays]]
# id = 0
# x = 0
# y = 0
# width = 1920
# height = 1080
# scale_factor = 1.0

[selection]
# Fixed region in global coordinates, replayed as a drag by `gifclip record`
# region = { x = 100, y = 100, width = 640, height = 480 }
"#
    .to_string()
}
