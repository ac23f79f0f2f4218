//! Capture session state machine
//!
//! Sequences selection, countdown, recording and encoding into one session
//! and owns the only shared mutable state in the crate: the active session
//! slot.
//!
//! ```text
//! Idle ─▶ Selecting ─▶ Countdown ─▶ Recording ─▶ Encoding ─▶ Completed
//!             │            │            │            │
//!             └────────────┴─────┬──────┴────────────┘
//!                                ▼
//!                       Cancelled | Failed
//! ```
//!
//! Cancellation is a flag on the session checked under the slot lock at every
//! transition, so once set no later stage can start. Running stages observe
//! it through a `watch` channel.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::CaptureConfig;
use crate::countdown::{CountdownController, CountdownEvent, CountdownOutcome};
use crate::encoder::EncoderProcessManager;
use crate::error::{ClipError, Result, SessionFailure};
use crate::recorder::RecorderProcessManager;
use crate::selection::{SelectionController, SelectionOutcome};
use crate::surface::{CaptureSurface, CountdownInit, CountdownSurface};
use crate::types::{Region, SessionId};
use crate::upload::{UploadReceipt, Uploader};

/// Capacity of the session event channel
const EVENT_CAPACITY: usize = 64;

/// External collaborators of the orchestrator
#[derive(Clone)]
pub struct CaptureDependencies {
    pub surface: Arc<dyn CaptureSurface>,
    pub uploader: Arc<dyn Uploader>,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Selecting,
    Countdown,
    Recording,
    Encoding,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Countdown => "countdown",
            Self::Recording => "recording",
            Self::Encoding => "encoding",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Result of handing the artifact to the uploader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadResult {
    Uploaded(UploadReceipt),
    Failed { message: String },
}

/// Terminal outcome of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed {
        artifact: PathBuf,
        upload: UploadResult,
    },
    Cancelled {
        /// State the session was in when the cancel took effect
        stage: SessionState,
    },
    Failed {
        stage: SessionState,
        failure: SessionFailure,
    },
}

impl SessionOutcome {
    /// Terminal state matching this outcome
    pub fn state(&self) -> SessionState {
        match self {
            Self::Completed { .. } => SessionState::Completed,
            Self::Cancelled { .. } => SessionState::Cancelled,
            Self::Failed { .. } => SessionState::Failed,
        }
    }
}

/// Everything known about a finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: SessionId,
    pub region: Option<Region>,
    pub recording_path: Option<PathBuf>,
    pub outcome: SessionOutcome,
    pub elapsed_ms: u64,
}

/// Point-in-time view of the active session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub region: Option<Region>,
    pub recording_path: Option<PathBuf>,
    pub artifact_path: Option<PathBuf>,
    pub cancel_requested: bool,
    pub elapsed_ms: u64,
}

/// Notifications for observers (UI shells, the daemon)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Started { session: SessionId },
    StateChanged { session: SessionId, state: SessionState },
    CountdownTick { session: SessionId, remaining: u32 },
    Finished(SessionReport),
}

/// The one active session
struct Session {
    id: SessionId,
    state: SessionState,
    region: Option<Region>,
    recording_path: Option<PathBuf>,
    artifact_path: Option<PathBuf>,
    cancel: watch::Sender<bool>,
    started_at: Instant,
}

impl Session {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            region: self.region,
            recording_path: self.recording_path.clone(),
            artifact_path: self.artifact_path.clone(),
            cancel_requested: *self.cancel.borrow(),
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

struct Inner {
    config: CaptureConfig,
    deps: CaptureDependencies,
    recorder: RecorderProcessManager,
    encoder: EncoderProcessManager,
    session: Mutex<Option<Session>>,
    last_report: Mutex<Option<SessionReport>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Top-level capture state machine
///
/// Cheap to clone; clones share the same session slot.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    inner: Arc<Inner>,
}

impl CaptureOrchestrator {
    /// Create an orchestrator with ffmpeg-backed managers built from `config`
    pub fn new(config: CaptureConfig, deps: CaptureDependencies) -> Result<Self> {
        config.validate_strict()?;
        for warning in config.validate() {
            warn!("{}", warning);
        }

        let ffmpeg = config.ffmpeg_path();
        debug!("Using ffmpeg at {:?}", ffmpeg);
        let recorder = RecorderProcessManager::new(&ffmpeg, &config.output_dir);
        let encoder = EncoderProcessManager::new(&ffmpeg)
            .with_colors(config.colors)
            .with_quality(config.quality);

        Ok(Self::with_managers(config, deps, recorder, encoder))
    }

    /// Create an orchestrator around preconfigured process managers
    pub fn with_managers(
        config: CaptureConfig,
        deps: CaptureDependencies,
        recorder: RecorderProcessManager,
        encoder: EncoderProcessManager,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                deps,
                recorder,
                encoder,
                session: Mutex::new(None),
                last_report: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.inner.config
    }

    /// Trigger entry point: start a session in the background
    ///
    /// Returns [`ClipError::SessionAlreadyActive`] without touching the
    /// running session if one exists. Must be called within a tokio runtime.
    pub fn start_session(&self) -> Result<SessionId> {
        let (id, cancel_rx) = self.inner.begin()?;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_session(id, cancel_rx).await;
        });
        Ok(id)
    }

    /// Run one session in the foreground and return its report
    pub async fn run_once(&self) -> Result<SessionReport> {
        let (id, cancel_rx) = self.inner.begin()?;
        Ok(Arc::clone(&self.inner).run_session(id, cancel_rx).await)
    }

    /// Request cancellation of the active session
    ///
    /// Idempotent. The session reaches `Cancelled` once the running stage
    /// has wound down, including process exit during recording.
    pub fn cancel(&self) -> Result<SessionId> {
        let slot = self.inner.session.lock();
        let session = slot.as_ref().ok_or(ClipError::NoActiveSession)?;
        if !session.cancel.send_replace(true) {
            info!("{}: cancel requested during {}", session.id, session.state);
        }
        Ok(session.id)
    }

    /// Stop the recording early and continue to encoding
    ///
    /// Returns whether a stop was delivered to a running recorder; outside
    /// the recording stage this is a no-op.
    pub fn finish_recording(&self) -> Result<bool> {
        let (id, state) = {
            let slot = self.inner.session.lock();
            let session = slot.as_ref().ok_or(ClipError::NoActiveSession)?;
            (session.id, session.state)
        };

        if state != SessionState::Recording {
            debug!("{}: finish requested during {}, ignoring", id, state);
            return Ok(false);
        }

        let stopped = self.inner.recorder.stop();
        if stopped {
            info!("{}: finishing recording early", id);
        }
        Ok(stopped)
    }

    /// Current state (`Idle` when no session is active)
    pub fn state(&self) -> SessionState {
        self.inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn is_active(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// Snapshot of the active session
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.inner.session.lock().as_ref().map(Session::snapshot)
    }

    /// Report of the most recently finished session
    pub fn last_report(&self) -> Option<SessionReport> {
        self.inner.last_report.lock().clone()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

/// Resolves once cancellation is requested; never if the session is gone
async fn cancelled(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Claim the session slot
    fn begin(&self) -> Result<(SessionId, watch::Receiver<bool>)> {
        let (id, cancel_rx) = {
            let mut slot = self.session.lock();
            if let Some(active) = slot.as_ref() {
                info!(
                    "Capture trigger ignored: {} is {}",
                    active.id, active.state
                );
                return Err(ClipError::SessionAlreadyActive);
            }

            let (cancel, cancel_rx) = watch::channel(false);
            let session = Session {
                id: SessionId::new(),
                state: SessionState::Selecting,
                region: None,
                recording_path: None,
                artifact_path: None,
                cancel,
                started_at: Instant::now(),
            };
            let id = session.id;
            *slot = Some(session);
            (id, cancel_rx)
        };

        info!("{}: started", id);
        self.emit(SessionEvent::Started { session: id });
        self.emit(SessionEvent::StateChanged {
            session: id,
            state: SessionState::Selecting,
        });
        Ok((id, cancel_rx))
    }

    /// Move to the next stage unless cancellation was requested
    fn transition(&self, id: SessionId, next: SessionState) -> Result<()> {
        {
            let mut slot = self.session.lock();
            let session = slot
                .as_mut()
                .filter(|s| s.id == id)
                .ok_or(ClipError::NoActiveSession)?;
            if *session.cancel.borrow() {
                return Err(ClipError::UserCancelled);
            }
            info!("{}: {} -> {}", id, session.state, next);
            session.state = next;
        }
        self.emit(SessionEvent::StateChanged {
            session: id,
            state: next,
        });
        Ok(())
    }

    /// Fail with `UserCancelled` if a cancel has been accepted for `id`
    fn ensure_not_cancelled(&self, id: SessionId) -> Result<()> {
        let slot = self.session.lock();
        let session = slot
            .as_ref()
            .filter(|s| s.id == id)
            .ok_or(ClipError::NoActiveSession)?;
        if *session.cancel.borrow() {
            return Err(ClipError::UserCancelled);
        }
        Ok(())
    }

    fn update(&self, id: SessionId, apply: impl FnOnce(&mut Session)) {
        if let Some(session) = self.session.lock().as_mut().filter(|s| s.id == id) {
            apply(session);
        }
    }

    fn current_state(&self, id: SessionId) -> SessionState {
        self.session
            .lock()
            .as_ref()
            .filter(|s| s.id == id)
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    async fn run_session(
        self: Arc<Self>,
        id: SessionId,
        cancel_rx: watch::Receiver<bool>,
    ) -> SessionReport {
        let result = self.drive(id, &cancel_rx).await;
        let stage = self.current_state(id);

        let outcome = match result {
            Ok((artifact, upload)) => SessionOutcome::Completed { artifact, upload },
            Err(e) if e.is_cancelled() => SessionOutcome::Cancelled { stage },
            Err(e) => {
                error!("{}: failed during {}: {}", id, stage, e);
                if let Some(hint) = e.user_hint() {
                    info!("Hint: {}", hint);
                }
                SessionOutcome::Failed {
                    stage,
                    failure: SessionFailure::from(&e),
                }
            }
        };

        self.finish(id, outcome)
    }

    /// Clear the slot and publish the report
    fn finish(&self, id: SessionId, outcome: SessionOutcome) -> SessionReport {
        let terminal = outcome.state();
        let session = {
            let mut slot = self.session.lock();
            match slot.as_ref() {
                Some(s) if s.id == id => slot.take(),
                _ => None,
            }
        };

        let report = match session {
            Some(session) => {
                info!("{}: {} -> {}", id, session.state, terminal);
                SessionReport {
                    id,
                    region: session.region,
                    recording_path: session.recording_path,
                    outcome,
                    elapsed_ms: session.started_at.elapsed().as_millis() as u64,
                }
            }
            None => {
                warn!("{}: finished without an active session slot", id);
                SessionReport {
                    id,
                    region: None,
                    recording_path: None,
                    outcome,
                    elapsed_ms: 0,
                }
            }
        };

        *self.last_report.lock() = Some(report.clone());
        self.emit(SessionEvent::StateChanged {
            session: id,
            state: terminal,
        });
        self.emit(SessionEvent::Finished(report.clone()));
        report
    }

    async fn drive(
        &self,
        id: SessionId,
        cancel_rx: &watch::Receiver<bool>,
    ) -> Result<(PathBuf, UploadResult)> {
        let region = self.select_region(id, cancel_rx).await?;
        self.update(id, |s| s.region = Some(region));

        self.transition(id, SessionState::Countdown)?;
        self.run_countdown(id, region, cancel_rx).await?;

        self.transition(id, SessionState::Recording)?;
        let recording = self.record(id, &region, cancel_rx).await?;
        self.update(id, |s| s.recording_path = Some(recording.clone()));

        self.transition(id, SessionState::Encoding)?;
        let artifact = self
            .encoder
            .encode_until(&recording, self.config.fps, cancelled(cancel_rx.clone()))
            .await?;
        self.update(id, |s| s.artifact_path = Some(artifact.clone()));

        self.ensure_not_cancelled(id)?;
        let upload = tokio::select! {
            biased;
            _ = cancelled(cancel_rx.clone()) => {
                info!("{}: upload abandoned for cancel", id);
                return Err(ClipError::UserCancelled);
            }
            result = self.deps.uploader.upload(&artifact) => match result {
                Ok(receipt) => UploadResult::Uploaded(receipt),
                Err(e) => {
                    warn!("{}: upload failed: {}", id, e);
                    UploadResult::Failed {
                        message: e.to_string(),
                    }
                }
            },
        };

        Ok((artifact, upload))
    }

    async fn select_region(
        &self,
        id: SessionId,
        cancel_rx: &watch::Receiver<bool>,
    ) -> Result<Region> {
        let displays = self.deps.surface.displays().await?;
        if displays.is_empty() {
            return Err(ClipError::NoDisplays);
        }
        debug!("{}: {} display(s) reported", id, displays.len());

        let controller = SelectionController::new(displays);
        let init = controller.init().ok_or(ClipError::NoDisplays)?;
        let mut events = self.deps.surface.open_selection(init).await?;

        match controller.run(&mut events, cancelled(cancel_rx.clone())).await {
            SelectionOutcome::Selected(region) => {
                info!("{}: selected {}", id, region);
                Ok(region)
            }
            SelectionOutcome::Cancelled => Err(ClipError::UserCancelled),
        }
    }

    async fn run_countdown(
        &self,
        id: SessionId,
        region: Region,
        cancel_rx: &watch::Receiver<bool>,
    ) -> Result<()> {
        let controller = CountdownController::new(self.config.countdown_secs)?;
        let CountdownSurface { mut cancel, events } = self
            .deps
            .surface
            .open_countdown(CountdownInit {
                duration_secs: controller.duration(),
                region,
            })
            .await?;

        let session_cancel = cancelled(cancel_rx.clone());
        let surface_cancel = async move {
            // A closed countdown window counts as a cancel
            let _ = cancel.recv().await;
            debug!("Countdown cancelled from the surface");
        };
        let either = async {
            tokio::select! {
                _ = session_cancel => {}
                _ = surface_cancel => {}
            }
        };

        let outcome = controller
            .run(either, |event| {
                if let Some(tx) = &events {
                    let _ = tx.send(event);
                }
                if let CountdownEvent::Tick { remaining } = event {
                    self.emit(SessionEvent::CountdownTick {
                        session: id,
                        remaining,
                    });
                }
            })
            .await;

        match outcome {
            CountdownOutcome::Completed => Ok(()),
            CountdownOutcome::Cancelled => Err(ClipError::UserCancelled),
        }
    }

    /// Record until natural exit, early finish, or cancel
    ///
    /// On cancel the recorder is stopped and its exit awaited before
    /// returning, so the session never leaves `Recording` with a live child.
    async fn record(
        &self,
        id: SessionId,
        region: &Region,
        cancel_rx: &watch::Receiver<bool>,
    ) -> Result<PathBuf> {
        let recording = self.recorder.start(
            region,
            self.config.fps,
            self.config.max_duration_secs,
        );
        tokio::pin!(recording);

        // Recorder first: its first poll claims the slot and spawns ffmpeg,
        // so a stop issued from the cancel branch always has a target.
        tokio::select! {
            biased;
            result = &mut recording => result,
            _ = cancelled(cancel_rx.clone()) => {
                info!("{}: stopping recorder for cancel", id);
                self.recorder.stop();
                match (&mut recording).await {
                    Ok(path) => debug!("{}: partial recording left at {:?}", id, path),
                    Err(e) => debug!("{}: recorder exited after cancel: {}", id, e),
                }
                Err(ClipError::UserCancelled)
            }
        }
    }
}
