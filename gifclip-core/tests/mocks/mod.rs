//! Mock infrastructure for testing
//!
//! Scripted stand-ins for the capture surface and uploader, plus shell
//! scripts that imitate ffmpeg closely enough to exercise process handling.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gifclip_core::countdown::CountdownEvent;
use gifclip_core::error::{ClipError, Result};
use gifclip_core::orchestrator::{SessionEvent, SessionReport, SessionState};
use gifclip_core::selection::{SelectionEvent, SelectionInit};
use gifclip_core::surface::{CaptureSurface, CountdownInit, CountdownSurface};
use gifclip_core::types::{Bounds, Display};
use gifclip_core::upload::{UploadReceipt, Uploader};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

/// Upper bound on any single wait in the integration tests
pub const TEST_TIMEOUT: Duration = Duration::from_secs(15);

/// The two-monitor layout used throughout
pub fn dual_displays() -> Vec<Display> {
    vec![
        Display::new(0, Bounds::new(0, 0, 1920, 1080), 1.0),
        Display::new(1, Bounds::new(1920, 0, 1280, 1024), 2.0),
    ]
}

/// What the selection window does once opened
#[derive(Debug, Clone)]
pub enum SelectionScript {
    /// Press at `from`, release at `to` (canvas-local)
    Drag { from: (f64, f64), to: (f64, f64) },
    /// Send these events, then close the window
    Events(Vec<SelectionEvent>),
    /// Stay open with no input
    Hang,
    /// Close without sending anything
    Close,
}

/// What the countdown window does once opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownScript {
    /// Let the countdown run out
    Allow,
    /// Press cancel straight away
    Cancel,
    /// Close the window
    Close,
}

/// Capture surface driven by scripts
pub struct ScriptedSurface {
    displays: Vec<Display>,
    selection: SelectionScript,
    countdown: CountdownScript,
    /// Senders held open for the lifetime of the surface
    held_selection: Mutex<Vec<mpsc::Sender<SelectionEvent>>>,
    held_cancel: Mutex<Vec<mpsc::Sender<()>>>,
    pub selection_inits: Mutex<Vec<SelectionInit>>,
    pub countdown_inits: Mutex<Vec<CountdownInit>>,
    pub countdown_events: Arc<Mutex<Vec<CountdownEvent>>>,
}

impl ScriptedSurface {
    pub fn new(displays: Vec<Display>, selection: SelectionScript) -> Self {
        Self {
            displays,
            selection,
            countdown: CountdownScript::Allow,
            held_selection: Mutex::new(Vec::new()),
            held_cancel: Mutex::new(Vec::new()),
            selection_inits: Mutex::new(Vec::new()),
            countdown_inits: Mutex::new(Vec::new()),
            countdown_events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Surface that drags a valid region on the dual layout
    pub fn dragging() -> Self {
        Self::new(
            dual_displays(),
            SelectionScript::Drag {
                from: (100.0, 100.0),
                to: (250.0, 180.0),
            },
        )
    }

    pub fn with_countdown(mut self, script: CountdownScript) -> Self {
        self.countdown = script;
        self
    }
}

#[async_trait]
impl CaptureSurface for ScriptedSurface {
    async fn displays(&self) -> Result<Vec<Display>> {
        Ok(self.displays.clone())
    }

    async fn open_selection(&self, init: SelectionInit) -> Result<mpsc::Receiver<SelectionEvent>> {
        self.selection_inits.lock().push(init);
        let (tx, rx) = mpsc::channel(16);

        match &self.selection {
            SelectionScript::Drag { from, to } => {
                let _ = tx.try_send(SelectionEvent::PointerDown { x: from.0, y: from.1 });
                let _ = tx.try_send(SelectionEvent::PointerMove { x: to.0, y: to.1 });
                let _ = tx.try_send(SelectionEvent::PointerUp { x: to.0, y: to.1 });
            }
            SelectionScript::Events(events) => {
                for event in events {
                    let _ = tx.try_send(*event);
                }
            }
            SelectionScript::Hang => self.held_selection.lock().push(tx),
            SelectionScript::Close => {}
        }

        Ok(rx)
    }

    async fn open_countdown(&self, init: CountdownInit) -> Result<CountdownSurface> {
        self.countdown_inits.lock().push(init);
        let (cancel_tx, cancel) = mpsc::channel(1);
        let (events, mut event_rx) = mpsc::unbounded_channel();

        match self.countdown {
            CountdownScript::Allow => self.held_cancel.lock().push(cancel_tx),
            CountdownScript::Cancel => {
                let _ = cancel_tx.try_send(());
                self.held_cancel.lock().push(cancel_tx);
            }
            CountdownScript::Close => drop(cancel_tx),
        }

        let seen = Arc::clone(&self.countdown_events);
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                seen.lock().push(event);
            }
        });

        Ok(CountdownSurface {
            cancel,
            events: Some(events),
        })
    }
}

/// Uploader that remembers what it was given
pub struct RecordingUploader {
    fail: bool,
    delay: Option<Duration>,
    pub uploads: Mutex<Vec<PathBuf>>,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self {
            fail: false,
            delay: None,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Succeeds only after `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, artifact: &Path) -> Result<UploadReceipt> {
        self.uploads.lock().push(artifact.to_path_buf());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ClipError::upload("Server returned 503 Service Unavailable"));
        }
        Ok(UploadReceipt {
            url: "https://gifs.example.com/g/abc123".to_string(),
            cdn_url: Some("https://cdn.example.com/abc123.gif".to_string()),
            id: Some("abc123".to_string()),
        })
    }
}

/// Recording that succeeds immediately
pub const RECORD_OK: &str = r#"printf 'video' > "$out"; exit 0"#;

/// Recording killed by the OS
pub const RECORD_KILLED: &str = r#"echo "killed" >&2; exit 137"#;

/// Recording that runs until `q` arrives on stdin, then finalizes slowly
///
/// Leaves `<output>.stopped` behind only once it is about to exit.
pub const RECORD_UNTIL_QUIT: &str =
    r#"read cmd; sleep 0.3; printf 'video' > "$out"; touch "$out.stopped"; exit 0"#;

/// Recording that ignores `q` entirely
pub const RECORD_STUBBORN: &str = "exec sleep 30";

/// Encoding that succeeds immediately
pub const ENCODE_OK: &str = r#"printf 'GIF89a' > "$out"; exit 0"#;

/// Encoding that rejects its input
pub const ENCODE_FAIL: &str =
    r#"echo "Invalid data found when processing input" >&2; exit 1"#;

/// Encoding that runs until `q` arrives on stdin
pub const ENCODE_UNTIL_QUIT: &str = "read cmd; exit 255";

/// Write an executable fake ffmpeg into `dir`
///
/// Encoding invocations are told apart by `-loop`; `$out` is the last
/// argument, which is the output path for both.
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path, record: &str, encode: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        "#!/bin/sh\nfor out; do :; done\ncase \"$*\" in\n  *-loop*) {encode} ;;\n  *) {record} ;;\nesac\n"
    );
    let path = dir.join("ffmpeg");
    std::fs::write(&path, script).expect("write fake ffmpeg");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake ffmpeg");
    path
}

/// Files in `dir` whose names end with `suffix`
pub fn files_ending(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.to_string_lossy().ends_with(suffix))
                .collect()
        })
        .unwrap_or_default()
}

/// Wait until the session reaches `state`
pub async fn wait_for_state(events: &mut broadcast::Receiver<SessionEvent>, state: SessionState) {
    tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::StateChanged { state: s, .. }) if s == state => return,
                Ok(_) => {}
                Err(e) => panic!("event stream ended before {}: {}", state, e),
            }
        }
    })
    .await
    .expect("timed out waiting for state");
}

/// Wait for the next finished-session report
pub async fn wait_finished(events: &mut broadcast::Receiver<SessionEvent>) -> SessionReport {
    tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Finished(report)) => return report,
                Ok(_) => {}
                Err(e) => panic!("event stream ended before finish: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for session to finish")
}
