//! IPC client for CLI commands
//!
//! Connects to the running daemon to send commands and receive responses.

use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::protocol::{DaemonStatus, IpcMessage, IpcResponse};
use super::socket_path;
use crate::error::{ClipError, Result};

/// Default connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read/write timeout
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// IPC client for communicating with the daemon
pub struct IpcClient {
    stream: UnixStream,
}

impl IpcClient {
    /// Connect to the daemon with default timeout
    pub async fn connect() -> Result<Self> {
        Self::connect_to(&socket_path(), CONNECT_TIMEOUT).await
    }

    /// Connect to a daemon listening on `path`
    pub async fn connect_to(path: &Path, timeout: Duration) -> Result<Self> {
        if !path.exists() {
            return Err(ClipError::ipc(format!("No daemon socket at {:?}", path)));
        }

        let stream = tokio::time::timeout(timeout, UnixStream::connect(path))
            .await
            .map_err(|_| ClipError::ipc("Connection timed out"))?
            .map_err(|e| ClipError::ipc(format!("Failed to connect to daemon: {}", e)))?;

        debug!("Connected to daemon at {:?}", path);

        Ok(Self { stream })
    }

    /// Send a message and receive a response
    pub async fn send(&mut self, msg: IpcMessage) -> Result<IpcResponse> {
        self.send_with_timeout(msg, IO_TIMEOUT).await
    }

    /// Send a message and receive a response with custom timeout
    pub async fn send_with_timeout(
        &mut self,
        msg: IpcMessage,
        timeout: Duration,
    ) -> Result<IpcResponse> {
        let (reader, mut writer) = self.stream.split();

        tokio::time::timeout(timeout, writer.write_all(&msg.to_bytes()))
            .await
            .map_err(|_| ClipError::ipc("Write timed out"))?
            .map_err(|e| ClipError::ipc(format!("Failed to send message: {}", e)))?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        tokio::time::timeout(timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| ClipError::ipc("Read timed out"))?
            .map_err(|e| ClipError::ipc(format!("Failed to read response: {}", e)))?;

        IpcResponse::from_bytes(line.trim().as_bytes())
            .map_err(|e| ClipError::ipc(format!("Invalid response: {}", e)))
    }

    /// Ping the daemon to check if it's alive
    pub async fn ping(&mut self) -> Result<bool> {
        match self.send(IpcMessage::Ping).await {
            Ok(IpcResponse::Pong) => Ok(true),
            Ok(_) | Err(_) => Ok(false),
        }
    }

    /// Get the current status
    pub async fn status(&mut self) -> Result<DaemonStatus> {
        match self.send(IpcMessage::Status).await? {
            IpcResponse::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Trigger a capture session
    ///
    /// Ignored triggers (a session already running) come back as
    /// [`IpcResponse::Ignored`] rather than an error.
    pub async fn start(&mut self) -> Result<IpcResponse> {
        self.command(IpcMessage::Start).await
    }

    /// Cancel the active session
    pub async fn cancel(&mut self) -> Result<IpcResponse> {
        self.command(IpcMessage::Cancel).await
    }

    /// Finish the active recording early
    pub async fn finish(&mut self) -> Result<IpcResponse> {
        self.command(IpcMessage::Finish).await
    }

    /// Request the daemon to shut down
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.send(IpcMessage::Shutdown).await? {
            IpcResponse::Stopping => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn command(&mut self, msg: IpcMessage) -> Result<IpcResponse> {
        match self.send(msg).await? {
            IpcResponse::Error { message } => Err(ClipError::ipc(message)),
            response => Ok(response),
        }
    }
}

fn unexpected(response: IpcResponse) -> ClipError {
    match response {
        IpcResponse::Error { message } => ClipError::ipc(message),
        other => ClipError::ipc(format!("Unexpected response: {:?}", other)),
    }
}
