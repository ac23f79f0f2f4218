//! Screen-region recording via an external ffmpeg process
//!
//! One capture backend per host OS. Width and height are rounded up to even
//! numbers before ffmpeg sees them (libx264 with yuv420p requires it).

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ClipError, Result};
use crate::process::ProcessHandle;
use crate::types::{ProcessStage, Region};

/// Time allowed between the quit request and a forced kill
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// ffmpeg screen-grab input device for the host platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CaptureBackend {
    /// Windows GDI grab with a direct region offset
    Gdigrab,
    /// macOS AVFoundation; captures the whole screen and crops
    Avfoundation {
        /// AVFoundation video device index
        device: u32,
    },
    /// X11 grab with a direct region offset
    X11grab {
        /// X display name, e.g. `:0.0`
        display: String,
    },
}

impl CaptureBackend {
    /// Backend for the platform this binary was built for
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Self::Gdigrab
        } else if cfg!(target_os = "macos") {
            Self::Avfoundation { device: 1 }
        } else {
            let display = std::env::var("DISPLAY")
                .ok()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| ":0.0".to_string());
            Self::X11grab { display }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gdigrab => "gdigrab",
            Self::Avfoundation { .. } => "avfoundation",
            Self::X11grab { .. } => "x11grab",
        }
    }

    /// Input arguments for capturing `region` at `fps`
    pub fn input_args(&self, region: &Region, fps: u32) -> Vec<String> {
        let (w, h) = (even(region.width), even(region.height));
        let (x, y) = (region.x, region.y);

        match self {
            Self::Gdigrab => vec![
                "-f".into(),
                "gdigrab".into(),
                "-framerate".into(),
                fps.to_string(),
                "-offset_x".into(),
                x.to_string(),
                "-offset_y".into(),
                y.to_string(),
                "-video_size".into(),
                format!("{}x{}", w, h),
                "-i".into(),
                "desktop".into(),
            ],
            Self::Avfoundation { device } => vec![
                "-f".into(),
                "avfoundation".into(),
                "-framerate".into(),
                fps.to_string(),
                "-capture_cursor".into(),
                "1".into(),
                "-i".into(),
                format!("{}:", device),
                "-vf".into(),
                format!("crop={}:{}:{}:{}", w, h, x, y),
            ],
            Self::X11grab { display } => vec![
                "-f".into(),
                "x11grab".into(),
                "-framerate".into(),
                fps.to_string(),
                "-video_size".into(),
                format!("{}x{}", w, h),
                "-i".into(),
                format!("{}+{},{}", display, x, y),
            ],
        }
    }
}

impl std::fmt::Display for CaptureBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gdigrab => write!(f, "gdigrab"),
            Self::Avfoundation { device } => write!(f, "avfoundation (device {})", device),
            Self::X11grab { display } => write!(f, "x11grab ({})", display),
        }
    }
}

/// Round up to the next even number
pub fn even(n: u32) -> u32 {
    n + n % 2
}

/// Full ffmpeg argument list for one recording
pub fn recording_args(
    backend: &CaptureBackend,
    region: &Region,
    fps: u32,
    max_duration_secs: u32,
    output: &Path,
) -> Vec<String> {
    let mut args = backend.input_args(region, fps);
    args.extend([
        "-t".to_string(),
        max_duration_secs.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]);
    args
}

/// Bookkeeping for the one outstanding recording
struct ActiveRecording {
    stop_tx: Option<oneshot::Sender<()>>,
    output: PathBuf,
}

/// Owns at most one running capture process
pub struct RecorderProcessManager {
    ffmpeg: PathBuf,
    backend: CaptureBackend,
    output_dir: PathBuf,
    stop_grace: Duration,
    active: Mutex<Option<ActiveRecording>>,
}

/// Clears the active slot on every exit path of `start`
struct ActiveGuard<'a>(&'a Mutex<Option<ActiveRecording>>);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().take();
    }
}

impl RecorderProcessManager {
    pub fn new(ffmpeg: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            backend: CaptureBackend::host(),
            output_dir: output_dir.into(),
            stop_grace: DEFAULT_STOP_GRACE,
            active: Mutex::new(None),
        }
    }

    /// Override the capture backend
    pub fn with_backend(mut self, backend: CaptureBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Override the quit-to-kill grace period
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn backend(&self) -> &CaptureBackend {
        &self.backend
    }

    /// Whether a recording is in progress (including while stopping)
    ///
    /// The slot is claimed when [`start`](Self::start) is first polled, just
    /// before ffmpeg is spawned, so this is briefly true for a recording
    /// whose spawn then fails. The slot is released on every exit path.
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Output path of the in-progress recording
    pub fn current_output(&self) -> Option<PathBuf> {
        self.active.lock().as_ref().map(|a| a.output.clone())
    }

    /// Request a graceful stop of the active recording
    ///
    /// Returns false when nothing is recording or a stop was already sent.
    /// The `start` future resolves once the process has actually exited.
    pub fn stop(&self) -> bool {
        let mut active = self.active.lock();
        match active.as_mut().and_then(|a| a.stop_tx.take()) {
            Some(tx) => {
                info!("Stop requested for active recording");
                let _ = tx.send(());
                true
            }
            None => {
                debug!("Stop requested with no active recording");
                false
            }
        }
    }

    /// Record `region` until the process exits, returning the video path
    ///
    /// ffmpeg bounds the recording to `max_duration_secs` on its own. A
    /// [`stop`](Self::stop) sends `q` and waits for exit, killing after the
    /// grace period. Exit code 0, or a clean exit after a stop request with
    /// the file written, yields the path.
    pub async fn start(&self, region: &Region, fps: u32, max_duration_secs: u32) -> Result<PathBuf> {
        let output = self
            .output_dir
            .join(format!("gifclip-{}.mp4", Uuid::new_v4()));

        let (stop_tx, mut stop_rx) = oneshot::channel();
        {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(ClipError::RecorderBusy);
            }
            *active = Some(ActiveRecording {
                stop_tx: Some(stop_tx),
                output: output.clone(),
            });
        }
        let _guard = ActiveGuard(&self.active);

        let args = recording_args(&self.backend, region, fps, max_duration_secs, &output);
        info!(
            "Recording {} at {}fps (max {}s) via {} to {:?}",
            region, fps, max_duration_secs, self.backend, output
        );

        let mut process = ProcessHandle::spawn(ProcessStage::Recording, &self.ffmpeg, &args)?;

        let mut stop_requested = false;
        let status = tokio::select! {
            status = process.wait() => status?,
            _ = &mut stop_rx => {
                stop_requested = true;
                process.stop(self.stop_grace).await?
            }
        };

        let exit = process.finish(status).await;
        let written = output_written(&output);

        if exit.success() || (stop_requested && !exit.force_killed && written) {
            info!("Recording finished: {:?} ({})", output, exit.status);
            Ok(output)
        } else {
            if !exit.diagnostics.is_empty() {
                warn!("ffmpeg stderr: {}", exit.diagnostics);
            }
            Err(exit.into_error(ProcessStage::Recording))
        }
    }
}

fn output_written(path: &Path) -> bool {
    path.metadata().is_ok_and(|m| m.len() > 0)
}
