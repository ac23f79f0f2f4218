//! External process lifecycle
//!
//! [`ProcessHandle`] owns one spawned ffmpeg invocation: its stdin, a
//! background reader that keeps a bounded tail of stderr, and the child
//! itself. Dropping the handle kills the child if it is still running.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ClipError, Result};
use crate::types::ProcessStage;

/// Maximum diagnostic characters kept from a process's stderr
pub const DIAGNOSTIC_TAIL_CHARS: usize = 500;

/// Environment variable overriding the ffmpeg binary
pub const FFMPEG_ENV: &str = "GIFCLIP_FFMPEG";

/// Locate the ffmpeg binary
///
/// Order: explicit path, `GIFCLIP_FFMPEG`, an `ffmpeg` bundled next to the
/// running executable, then plain `ffmpeg` resolved through `PATH`.
pub fn resolve_ffmpeg(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    if let Some(path) = std::env::var_os(FFMPEG_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }

    let binary_name = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
    if let Some(bundled) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(binary_name)))
        .filter(|p| p.is_file())
    {
        return bundled;
    }

    PathBuf::from(binary_name)
}

/// First line of `ffmpeg -version`, or `None` if the binary does not run
pub async fn ffmpeg_version(ffmpeg: &Path) -> Option<String> {
    let output = Command::new(ffmpeg)
        .arg("-version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| debug!("ffmpeg check failed for {:?}: {}", ffmpeg, e))
        .ok()?;

    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}

/// Keep the last `max_chars` characters of `text`
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// How a process ended
#[derive(Debug)]
pub struct ProcessExit {
    pub status: ExitStatus,
    /// Bounded, trimmed stderr tail
    pub diagnostics: String,
    /// Whether the process had to be killed
    pub force_killed: bool,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit failure for this stage
    pub fn into_error(self, stage: ProcessStage) -> ClipError {
        ClipError::ProcessExitFailed {
            stage,
            code: self.status.code(),
            diagnostics: self.diagnostics,
        }
    }
}

/// Scoped ownership of one spawned process
pub struct ProcessHandle {
    stage: ProcessStage,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_reader: Option<JoinHandle<String>>,
    force_killed: bool,
}

impl ProcessHandle {
    /// Spawn `program` with `args`, piping all three streams
    ///
    /// A missing or unrunnable binary is reported as
    /// [`ClipError::ProcessSpawnFailed`].
    pub fn spawn(stage: ProcessStage, program: &Path, args: &[String]) -> Result<Self> {
        info!("Starting {} process: {} {}", stage, program.display(), args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClipError::ProcessSpawnFailed {
                stage,
                program: program.display().to_string(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take();
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut tail = String::new();
                let mut buf = [0u8; 4096];
                loop {
                    match stderr.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            tail.push_str(&String::from_utf8_lossy(&buf[..n]));
                            // Trim lazily so the buffer stays bounded without
                            // re-slicing on every read
                            if tail.len() > DIAGNOSTIC_TAIL_CHARS * 8 {
                                tail = tail_chars(&tail, DIAGNOSTIC_TAIL_CHARS).to_string();
                            }
                        }
                    }
                }
                tail
            })
        });

        debug!("{} process started with pid {:?}", stage, child.id());

        Ok(Self {
            stage,
            child,
            stdin,
            stderr_reader,
            force_killed: false,
        })
    }

    pub fn stage(&self) -> ProcessStage {
        self.stage
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Ask the process to quit by writing `q` to its stdin, then close it
    ///
    /// Falls back to killing when stdin is gone or the write fails.
    pub async fn request_quit(&mut self) {
        let written = match self.stdin.take() {
            Some(mut stdin) => {
                let result = async {
                    stdin.write_all(b"q\n").await?;
                    stdin.flush().await?;
                    stdin.shutdown().await
                }
                .await;
                // Dropping stdin closes the pipe either way
                drop(stdin);
                result
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin already closed",
            )),
        };

        if let Err(e) = written {
            warn!("Could not send quit to {} process ({}), killing", self.stage, e);
            self.kill().await;
        }
    }

    /// Forcibly terminate the process
    pub async fn kill(&mut self) {
        match self.child.kill().await {
            Ok(()) => {
                self.force_killed = true;
                warn!("{} process killed", self.stage);
            }
            Err(e) => debug!("Kill of {} process returned: {}", self.stage, e),
        }
    }

    /// Graceful quit, escalating to kill after `grace`; returns the exit status
    pub async fn stop(&mut self, grace: Duration) -> Result<ExitStatus> {
        self.request_quit().await;
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!(
                    "{} process did not exit within {:?} of quit request",
                    self.stage, grace
                );
                self.kill().await;
                self.wait().await
            }
        }
    }

    /// Release the handle after exit, collecting the diagnostic tail
    pub async fn finish(mut self, status: ExitStatus) -> ProcessExit {
        self.stdin.take();
        let raw = match self.stderr_reader.take() {
            Some(reader) => reader.await.unwrap_or_default(),
            None => String::new(),
        };
        let diagnostics = tail_chars(raw.trim_end(), DIAGNOSTIC_TAIL_CHARS)
            .trim_start()
            .to_string();

        debug!("{} process exited: {}", self.stage, status);
        ProcessExit {
            status,
            diagnostics,
            force_killed: self.force_killed,
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if let Some(reader) = self.stderr_reader.take() {
            reader.abort();
        }
        if let Ok(None) = self.child.try_wait() {
            warn!("{} process handle dropped while running, killing", self.stage);
            let _ = self.child.start_kill();
        }
    }
}
