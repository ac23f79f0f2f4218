//! IPC protocol definitions
//!
//! Newline-delimited JSON, one request and one response per line.

use serde::{Deserialize, Serialize};

use crate::orchestrator::{SessionReport, SessionSnapshot, SessionState};
use crate::types::SessionId;

/// Messages that can be sent to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcMessage {
    /// Check if daemon is alive
    Ping,
    /// Request current status
    Status,
    /// Start a capture session (the hotkey trigger)
    Start,
    /// Cancel the active session
    Cancel,
    /// Stop recording early and encode what was captured
    Finish,
    /// Stop the daemon
    Shutdown,
}

/// Responses from the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcResponse {
    /// Simple acknowledgment
    Ok,
    /// Pong response to ping
    Pong,
    /// A session was started
    Started { session: SessionId },
    /// Request was valid but had nothing to act on
    Ignored { reason: String },
    /// Status response
    Status(DaemonStatus),
    /// Error response
    Error { message: String },
    /// Shutdown acknowledgment
    Stopping,
}

/// Daemon and session status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Current session state (`idle` when nothing is running)
    pub state: SessionState,
    /// Active session, if any
    pub session: Option<SessionSnapshot>,
    /// Most recently finished session
    pub last_session: Option<SessionReport>,
    /// Daemon process ID
    pub pid: u32,
    /// Daemon uptime in seconds
    pub uptime_seconds: u64,
}

impl IpcMessage {
    /// Serialize message to JSON bytes with newline terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl IpcResponse {
    /// Serialize response to JSON bytes with newline terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }

    /// Deserialize response from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        IpcResponse::Error {
            message: message.into(),
        }
    }

    /// Create an ignored response
    pub fn ignored(reason: impl Into<String>) -> Self {
        IpcResponse::Ignored {
            reason: reason.into(),
        }
    }
}
