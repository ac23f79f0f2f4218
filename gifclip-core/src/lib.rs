//! gifclip Core Library
//!
//! Region capture to animated GIF.
//!
//! This library provides:
//! - Multi-display region selection over a virtual canvas
//! - A cancellable countdown
//! - Screen recording and palette-based GIF encoding via ffmpeg
//! - A single-session capture orchestrator with upload hand-off
//! - Unix socket IPC so hotkey daemons can trigger captures
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────────────┐   ┌────────────────┐   ┌──────────┐
//! │ Selection │──▶│ Countdown │──▶│ Recorder       │──▶│ Encoder        │──▶│ Uploader │
//! │ (surface) │   │ (surface) │   │ (ffmpeg, .mp4) │   │ (ffmpeg, .gif) │   │          │
//! └───────────┘   └───────────┘   └────────────────┘   └────────────────┘   └──────────┘
//!        ▲               ▲                 ▲                    ▲                  ▲
//!        └───────────────┴──── CaptureOrchestrator (one session at a time) ───────┘
//! ```

pub mod config;
pub mod countdown;
pub mod display;
pub mod encoder;
pub mod error;
pub mod ipc;
pub mod orchestrator;
pub mod process;
pub mod recorder;
pub mod selection;
pub mod surface;
pub mod types;
pub mod upload;

pub use config::{CaptureConfig, ConfigFile, QualityTier, UploadTarget};
pub use error::{ClipError, Result};
pub use orchestrator::{
    CaptureDependencies, CaptureOrchestrator, SessionEvent, SessionOutcome, SessionReport,
    SessionState,
};
pub use surface::CaptureSurface;
pub use types::{Bounds, Display, Region, SessionId};
pub use upload::Uploader;
