//! Error types for gifclip

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProcessStage;

/// Result type alias using ClipError
pub type Result<T> = std::result::Result<T, ClipError>;

/// Main error type for gifclip operations
#[derive(Debug, Error)]
pub enum ClipError {
    /// Drag was smaller than the minimum selection size
    ///
    /// Absorbed by the selection stage; never ends a session.
    #[error("Selection too small: {width}x{height}")]
    SelectionRejected { width: u32, height: u32 },

    /// The user cancelled the current stage
    #[error("Cancelled by user")]
    UserCancelled,

    /// External binary could not be started
    #[error("Failed to start {stage} process '{program}': {reason}")]
    ProcessSpawnFailed {
        stage: ProcessStage,
        program: String,
        reason: String,
    },

    /// External process exited without a usable artifact
    #[error("{stage} process exited with {}: {diagnostics}", exit_code_label(*.code))]
    ProcessExitFailed {
        stage: ProcessStage,
        code: Option<i32>,
        diagnostics: String,
    },

    /// A session is already running
    #[error("A capture session is already active")]
    SessionAlreadyActive,

    /// No session is running
    #[error("No active capture session")]
    NoActiveSession,

    /// Host reported no displays
    #[error("No displays available for capture")]
    NoDisplays,

    /// Recorder already owns a running capture process
    #[error("Recorder is already running")]
    RecorderBusy,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upload collaborator error
    #[error("Upload error: {0}")]
    Upload(String),

    /// Daemon communication error
    #[error("IPC error: {0}")]
    Ipc(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ClipError>,
    },
}

fn exit_code_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

impl ClipError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an upload error
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    /// Create an IPC error
    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::Ipc(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping context wrappers
    pub fn root(&self) -> &ClipError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error represents a user cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::UserCancelled)
    }

    /// Actionable hint for the user, if there is one
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::ProcessSpawnFailed { .. } => Some(
                "Is ffmpeg installed? Put it on PATH, set GIFCLIP_FFMPEG, or set recording.ffmpeg in config.toml",
            ),
            Self::ProcessExitFailed {
                stage: ProcessStage::Recording,
                ..
            } => Some("Screen capture failed. Check display permissions and that the region is on screen"),
            Self::ProcessExitFailed {
                stage: ProcessStage::Encoding,
                ..
            } => Some("GIF encoding failed. The recording may be empty or truncated; try again"),
            Self::SessionAlreadyActive => {
                Some("Finish or cancel the running capture first (gifclip cancel)")
            }
            Self::NoActiveSession => Some("Start a capture first (gifclip start)"),
            Self::Ipc(_) => Some("Is the daemon running? Start it with 'gifclip daemon'"),
            Self::NoDisplays => Some("No monitors were reported; add [[displays]] to config.toml"),
            Self::Config(_) => Some("Check your config.toml (see 'gifclip config path')"),
            Self::Upload(_) => Some("Check upload.api_url in config.toml or use --no-upload"),
            _ => None,
        }
    }

    /// Whether the user can fix this without code changes
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::SelectionRejected { .. }
                | Self::UserCancelled
                | Self::ProcessSpawnFailed { .. }
                | Self::SessionAlreadyActive
                | Self::NoActiveSession
                | Self::NoDisplays
                | Self::Config(_)
                | Self::Upload(_)
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl From<reqwest::Error> for ClipError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upload(err.to_string())
    }
}

/// Failure classification carried in session reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Broken installation: the external binary did not start
    ProcessSpawnFailed,
    /// Bad capture: the external process exited abnormally
    ProcessExitFailed,
    /// Anything else (no displays, surface errors, I/O)
    Other,
}

/// Cloneable summary of the error that failed a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    /// Failure classification
    pub kind: FailureKind,
    /// Rendered error message
    pub message: String,
    /// Exit code for exit failures (None when killed by a signal)
    pub exit_code: Option<i32>,
    /// Bounded tail of the process diagnostic stream
    pub diagnostics: Option<String>,
}

impl From<&ClipError> for SessionFailure {
    fn from(err: &ClipError) -> Self {
        let message = err.to_string();
        match err.root() {
            ClipError::ProcessSpawnFailed { .. } => Self {
                kind: FailureKind::ProcessSpawnFailed,
                message,
                exit_code: None,
                diagnostics: None,
            },
            ClipError::ProcessExitFailed {
                code, diagnostics, ..
            } => Self {
                kind: FailureKind::ProcessExitFailed,
                message,
                exit_code: *code,
                diagnostics: Some(diagnostics.clone()),
            },
            _ => Self {
                kind: FailureKind::Other,
                message,
                exit_code: None,
                diagnostics: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_failure_display() {
        let err = ClipError::ProcessExitFailed {
            stage: ProcessStage::Recording,
            code: Some(137),
            diagnostics: "killed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Recording process exited with code 137: killed"
        );
    }

    #[test]
    fn test_signal_exit_display() {
        let err = ClipError::ProcessExitFailed {
            stage: ProcessStage::Encoding,
            code: None,
            diagnostics: String::new(),
        };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn test_failure_from_context_wrapped_error() {
        let err = ClipError::ProcessExitFailed {
            stage: ProcessStage::Recording,
            code: Some(1),
            diagnostics: "no such display".to_string(),
        }
        .with_context("Recording stage");

        let failure = SessionFailure::from(&err);
        assert_eq!(failure.kind, FailureKind::ProcessExitFailed);
        assert_eq!(failure.exit_code, Some(1));
        assert_eq!(failure.diagnostics.as_deref(), Some("no such display"));
        assert!(failure.message.starts_with("Recording stage"));
    }
}
