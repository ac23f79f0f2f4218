//! Video to GIF transcoding via an external ffmpeg process
//!
//! Uses the two-pass palette pipeline: `palettegen` derives an optimal
//! palette from every frame, `paletteuse` renders frames against it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ClipError, Result};
use crate::process::ProcessHandle;
use crate::types::ProcessStage;

/// Smallest palette accepted by palettegen for our purposes
pub const MIN_COLORS: u16 = 16;

/// Largest GIF palette
pub const MAX_COLORS: u16 = 256;

/// Time allowed for ffmpeg to exit after a quit request during cancel
const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Output quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// No dithering; smallest files
    Low,
    /// Ordered dithering
    Medium,
    /// Error-diffusion dithering
    #[default]
    High,
}

impl QualityTier {
    /// `paletteuse` dither option
    pub fn dither(&self) -> &'static str {
        match self {
            Self::Low => "none",
            Self::Medium => "bayer:bayer_scale=3",
            Self::High => "sierra2_4a",
        }
    }

    /// `palettegen` stats mode
    pub fn stats_mode(&self) -> &'static str {
        match self {
            Self::Low => "diff",
            Self::Medium | Self::High => "full",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "med" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown quality: {}", s)),
        }
    }
}

/// Filter graph for the two-pass palette render
pub fn palette_filter(fps: u32, colors: u16, quality: QualityTier) -> String {
    format!(
        "fps={fps},split[s0][s1];[s0]palettegen=max_colors={colors}:stats_mode={stats}[p];[s1][p]paletteuse=dither={dither}",
        stats = quality.stats_mode(),
        dither = quality.dither(),
    )
}

/// Output path for a source video: same name with a `.gif` extension
pub fn gif_path_for(source: &Path) -> PathBuf {
    source.with_extension("gif")
}

/// Full ffmpeg argument list for one transcode
pub fn encoding_args(
    source: &Path,
    output: &Path,
    fps: u32,
    colors: u16,
    quality: QualityTier,
) -> Vec<String> {
    vec![
        "-i".to_string(),
        source.display().to_string(),
        "-vf".to_string(),
        palette_filter(fps, colors, quality),
        "-loop".to_string(),
        "0".to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]
}

/// Owns one transcode invocation at a time
pub struct EncoderProcessManager {
    ffmpeg: PathBuf,
    colors: u16,
    quality: QualityTier,
}

impl EncoderProcessManager {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            colors: MAX_COLORS,
            quality: QualityTier::default(),
        }
    }

    /// Set palette size (clamped to 16–256)
    pub fn with_colors(mut self, colors: u16) -> Self {
        self.colors = colors.clamp(MIN_COLORS, MAX_COLORS);
        self
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    pub fn colors(&self) -> u16 {
        self.colors
    }

    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    /// Transcode `source` to a looping GIF next to it
    pub async fn encode(&self, source: &Path, fps: u32) -> Result<PathBuf> {
        self.encode_until(source, fps, std::future::pending()).await
    }

    /// Transcode, abandoning the work if `cancelled` completes first
    ///
    /// On cancel the process is asked to quit and reaped before
    /// [`ClipError::UserCancelled`] is returned.
    pub async fn encode_until<F>(&self, source: &Path, fps: u32, cancelled: F) -> Result<PathBuf>
    where
        F: Future<Output = ()>,
    {
        let output = gif_path_for(source);
        let args = encoding_args(source, &output, fps, self.colors, self.quality);
        info!(
            "Encoding {:?} -> {:?} ({} colors, {} quality)",
            source, output, self.colors, self.quality
        );

        let mut process = ProcessHandle::spawn(ProcessStage::Encoding, &self.ffmpeg, &args)?;

        tokio::pin!(cancelled);
        let mut was_cancelled = false;
        let status = tokio::select! {
            status = process.wait() => status?,
            _ = &mut cancelled => {
                was_cancelled = true;
                process.stop(CANCEL_GRACE).await?
            }
        };

        let exit = process.finish(status).await;
        if was_cancelled {
            info!("Encoding cancelled");
            return Err(ClipError::UserCancelled);
        }

        if exit.success() {
            info!("GIF encoding complete: {:?}", output);
            Ok(output)
        } else {
            if !exit.diagnostics.is_empty() {
                warn!("ffmpeg stderr: {}", exit.diagnostics);
            }
            Err(exit.into_error(ProcessStage::Encoding))
        }
    }
}
