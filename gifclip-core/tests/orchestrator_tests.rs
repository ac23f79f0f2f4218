//! Integration tests for the capture session state machine
//!
//! ffmpeg is replaced by shell scripts, so these only run on Unix.

#![cfg(unix)]

mod mocks;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gifclip_core::config::CaptureConfig;
use gifclip_core::encoder::EncoderProcessManager;
use gifclip_core::error::{ClipError, FailureKind};
use gifclip_core::orchestrator::{
    CaptureDependencies, CaptureOrchestrator, SessionEvent, SessionOutcome, SessionState,
    UploadResult,
};
use gifclip_core::recorder::{CaptureBackend, RecorderProcessManager};
use gifclip_core::selection::SelectionEvent;
use gifclip_core::types::{DisplayId, Region};
use mocks::*;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    orchestrator: CaptureOrchestrator,
    surface: Arc<ScriptedSurface>,
    uploader: Arc<RecordingUploader>,
}

fn harness_with(
    surface: ScriptedSurface,
    uploader: RecordingUploader,
    record: &str,
    encode: &str,
) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let ffmpeg = fake_ffmpeg(dir.path(), record, encode);
    build(dir, ffmpeg.as_path(), surface, uploader)
}

fn harness(surface: ScriptedSurface, record: &str, encode: &str) -> Harness {
    harness_with(surface, RecordingUploader::new(), record, encode)
}

fn build(
    dir: TempDir,
    ffmpeg: &Path,
    surface: ScriptedSurface,
    uploader: RecordingUploader,
) -> Harness {
    let config = CaptureConfig::default()
        .with_countdown(0)
        .with_output_dir(dir.path())
        .with_ffmpeg(ffmpeg);

    let recorder = RecorderProcessManager::new(ffmpeg, dir.path())
        .with_backend(CaptureBackend::X11grab {
            display: ":0".to_string(),
        })
        .with_stop_grace(Duration::from_secs(2));
    let encoder = EncoderProcessManager::new(ffmpeg);

    let surface = Arc::new(surface);
    let uploader = Arc::new(uploader);
    let deps = CaptureDependencies {
        surface: surface.clone(),
        uploader: uploader.clone(),
    };

    Harness {
        orchestrator: CaptureOrchestrator::with_managers(config, deps, recorder, encoder),
        dir,
        surface,
        uploader,
    }
}

#[tokio::test]
async fn test_completed_session_uploads_gif() {
    let h = harness(ScriptedSurface::dragging(), RECORD_OK, ENCODE_OK);

    let report = h.orchestrator.run_once().await.expect("session runs");

    assert_eq!(
        report.region,
        Some(Region {
            x: 100,
            y: 100,
            width: 150,
            height: 80,
            display_id: DisplayId(0),
        })
    );
    match &report.outcome {
        SessionOutcome::Completed { artifact, upload } => {
            assert_eq!(artifact.extension().and_then(|e| e.to_str()), Some("gif"));
            assert!(artifact.exists());
            match upload {
                UploadResult::Uploaded(receipt) => {
                    assert_eq!(receipt.url, "https://gifs.example.com/g/abc123")
                }
                other => panic!("expected upload receipt, got {:?}", other),
            }
            assert_eq!(h.uploader.uploads.lock().as_slice(), &[artifact.clone()]);
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(h.orchestrator.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_recorder_killed_fails_session() {
    let h = harness(ScriptedSurface::dragging(), RECORD_KILLED, ENCODE_OK);

    let report = h.orchestrator.run_once().await.unwrap();

    match report.outcome {
        SessionOutcome::Failed { stage, failure } => {
            assert_eq!(stage, SessionState::Recording);
            assert_eq!(failure.kind, FailureKind::ProcessExitFailed);
            assert_eq!(failure.exit_code, Some(137));
            assert_eq!(failure.diagnostics.as_deref(), Some("killed"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(h.uploader.uploads.lock().is_empty());
    assert!(!h.orchestrator.is_active());
}

#[tokio::test]
async fn test_missing_ffmpeg_is_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no-such-ffmpeg");
    let h = build(dir, &missing, ScriptedSurface::dragging(), RecordingUploader::new());

    let report = h.orchestrator.run_once().await.unwrap();

    match report.outcome {
        SessionOutcome::Failed { stage, failure } => {
            assert_eq!(stage, SessionState::Recording);
            assert_eq!(failure.kind, FailureKind::ProcessSpawnFailed);
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_encoder_failure_fails_session() {
    let h = harness(ScriptedSurface::dragging(), RECORD_OK, ENCODE_FAIL);

    let report = h.orchestrator.run_once().await.unwrap();

    match report.outcome {
        SessionOutcome::Failed { stage, failure } => {
            assert_eq!(stage, SessionState::Encoding);
            assert_eq!(failure.kind, FailureKind::ProcessExitFailed);
            assert!(failure
                .diagnostics
                .unwrap_or_default()
                .contains("Invalid data"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(report.recording_path.is_some());
}

#[tokio::test]
async fn test_upload_failure_still_completes() {
    let h = harness_with(
        ScriptedSurface::dragging(),
        RecordingUploader::failing(),
        RECORD_OK,
        ENCODE_OK,
    );

    let report = h.orchestrator.run_once().await.unwrap();

    match report.outcome {
        SessionOutcome::Completed {
            upload: UploadResult::Failed { message },
            ..
        } => assert!(message.contains("503")),
        other => panic!("expected Completed with failed upload, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_during_recording_waits_for_exit() {
    let h = harness(ScriptedSurface::dragging(), RECORD_UNTIL_QUIT, ENCODE_OK);
    let mut events = h.orchestrator.subscribe();

    h.orchestrator.start_session().unwrap();
    wait_for_state(&mut events, SessionState::Recording).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.orchestrator.cancel().unwrap();

    let report = wait_finished(&mut events).await;

    assert_eq!(
        report.outcome,
        SessionOutcome::Cancelled {
            stage: SessionState::Recording
        }
    );
    // The script only leaves this marker as it exits
    assert_eq!(files_ending(h.dir.path(), ".stopped").len(), 1);
    assert!(h.uploader.uploads.lock().is_empty());
    assert_eq!(h.orchestrator.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_finish_during_recording_encodes_partial() {
    let h = harness(ScriptedSurface::dragging(), RECORD_UNTIL_QUIT, ENCODE_OK);
    let mut events = h.orchestrator.subscribe();

    h.orchestrator.start_session().unwrap();
    wait_for_state(&mut events, SessionState::Recording).await;

    let mut delivered = false;
    for _ in 0..50 {
        if h.orchestrator.finish_recording().unwrap() {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(delivered, "finish never reached the recorder");

    let report = wait_finished(&mut events).await;
    assert!(matches!(report.outcome, SessionOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_finish_outside_recording_is_noop() {
    let surface = ScriptedSurface::new(dual_displays(), SelectionScript::Hang);
    let h = harness(surface, RECORD_OK, ENCODE_OK);
    let mut events = h.orchestrator.subscribe();

    h.orchestrator.start_session().unwrap();
    assert!(!h.orchestrator.finish_recording().unwrap());
    assert_eq!(h.orchestrator.state(), SessionState::Selecting);

    h.orchestrator.cancel().unwrap();
    wait_finished(&mut events).await;
    assert!(matches!(
        h.orchestrator.finish_recording(),
        Err(ClipError::NoActiveSession)
    ));
}

#[tokio::test]
async fn test_second_trigger_is_ignored() {
    let surface = ScriptedSurface::new(dual_displays(), SelectionScript::Hang);
    let h = harness(surface, RECORD_OK, ENCODE_OK);
    let mut events = h.orchestrator.subscribe();

    let first = h.orchestrator.start_session().unwrap();
    let second = h.orchestrator.start_session();

    assert!(matches!(second, Err(ClipError::SessionAlreadyActive)));
    let snapshot = h.orchestrator.snapshot().unwrap();
    assert_eq!(snapshot.id, first);
    assert_eq!(snapshot.state, SessionState::Selecting);

    h.orchestrator.cancel().unwrap();
    let report = wait_finished(&mut events).await;
    assert_eq!(report.id, first);
    assert_eq!(
        report.outcome,
        SessionOutcome::Cancelled {
            stage: SessionState::Selecting
        }
    );
    assert_eq!(h.surface.selection_inits.lock().len(), 1);
}

#[tokio::test]
async fn test_new_session_after_terminal_state() {
    let h = harness(ScriptedSurface::dragging(), RECORD_OK, ENCODE_OK);

    let first = h.orchestrator.run_once().await.unwrap();
    let second = h.orchestrator.run_once().await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(h.orchestrator.last_report().map(|r| r.id), Some(second.id));
}

#[tokio::test]
async fn test_selection_cancel_never_records() {
    let surface = ScriptedSurface::new(
        dual_displays(),
        SelectionScript::Events(vec![
            SelectionEvent::PointerDown { x: 10.0, y: 10.0 },
            SelectionEvent::Cancel,
        ]),
    );
    let h = harness(surface, RECORD_OK, ENCODE_OK);

    let report = h.orchestrator.run_once().await.unwrap();

    assert_eq!(
        report.outcome,
        SessionOutcome::Cancelled {
            stage: SessionState::Selecting
        }
    );
    assert!(files_ending(h.dir.path(), ".mp4").is_empty());
    assert!(h.surface.countdown_inits.lock().is_empty());
}

#[tokio::test]
async fn test_small_drag_then_close_is_cancel() {
    let surface = ScriptedSurface::new(
        dual_displays(),
        SelectionScript::Events(vec![
            SelectionEvent::PointerDown { x: 10.0, y: 10.0 },
            SelectionEvent::PointerUp { x: 15.0, y: 200.0 },
        ]),
    );
    let h = harness(surface, RECORD_OK, ENCODE_OK);

    let report = h.orchestrator.run_once().await.unwrap();

    assert!(matches!(report.outcome, SessionOutcome::Cancelled { .. }));
    assert_eq!(report.region, None);
}

#[tokio::test]
async fn test_closed_selection_surface_is_cancel() {
    let surface = ScriptedSurface::new(dual_displays(), SelectionScript::Close);
    let h = harness(surface, RECORD_OK, ENCODE_OK);

    let report = h.orchestrator.run_once().await.unwrap();

    assert_eq!(
        report.outcome,
        SessionOutcome::Cancelled {
            stage: SessionState::Selecting
        }
    );
}

#[tokio::test]
async fn test_countdown_cancel_never_records() {
    let surface = ScriptedSurface::dragging().with_countdown(CountdownScript::Cancel);
    let h = harness(surface, RECORD_OK, ENCODE_OK);

    let report = h.orchestrator.run_once().await.unwrap();

    assert_eq!(
        report.outcome,
        SessionOutcome::Cancelled {
            stage: SessionState::Countdown
        }
    );
    assert!(files_ending(h.dir.path(), ".mp4").is_empty());
}

#[tokio::test]
async fn test_closed_countdown_surface_is_cancel() {
    let surface = ScriptedSurface::dragging().with_countdown(CountdownScript::Close);
    let h = harness(surface, RECORD_OK, ENCODE_OK);

    let report = h.orchestrator.run_once().await.unwrap();

    assert!(matches!(
        report.outcome,
        SessionOutcome::Cancelled {
            stage: SessionState::Countdown
        }
    ));
}

#[tokio::test]
async fn test_cancel_during_encoding() {
    let h = harness(ScriptedSurface::dragging(), RECORD_OK, ENCODE_UNTIL_QUIT);
    let mut events = h.orchestrator.subscribe();

    h.orchestrator.start_session().unwrap();
    wait_for_state(&mut events, SessionState::Encoding).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.orchestrator.cancel().unwrap();

    let report = wait_finished(&mut events).await;
    assert_eq!(
        report.outcome,
        SessionOutcome::Cancelled {
            stage: SessionState::Encoding
        }
    );
    assert!(h.uploader.uploads.lock().is_empty());
}

#[tokio::test]
async fn test_cancel_during_upload_is_honored() {
    let h = harness_with(
        ScriptedSurface::dragging(),
        RecordingUploader::slow(Duration::from_secs(5)),
        RECORD_OK,
        ENCODE_OK,
    );
    let mut events = h.orchestrator.subscribe();

    h.orchestrator.start_session().unwrap();
    tokio::time::timeout(TEST_TIMEOUT, async {
        while h.uploader.uploads.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("upload never started");

    assert_eq!(h.orchestrator.state(), SessionState::Encoding);
    h.orchestrator.cancel().unwrap();

    let report = wait_finished(&mut events).await;
    assert_eq!(
        report.outcome,
        SessionOutcome::Cancelled {
            stage: SessionState::Encoding
        }
    );
    assert_eq!(files_ending(h.dir.path(), ".gif").len(), 1);
    assert_eq!(h.orchestrator.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_no_displays_fails_session() {
    let surface = ScriptedSurface::new(Vec::new(), SelectionScript::Close);
    let h = harness(surface, RECORD_OK, ENCODE_OK);

    let report = h.orchestrator.run_once().await.unwrap();

    match report.outcome {
        SessionOutcome::Failed { stage, failure } => {
            assert_eq!(stage, SessionState::Selecting);
            assert_eq!(failure.kind, FailureKind::Other);
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_event_sequence() {
    let h = harness(ScriptedSurface::dragging(), RECORD_OK, ENCODE_OK);
    let mut events = h.orchestrator.subscribe();

    let report = h.orchestrator.run_once().await.unwrap();

    let mut states = Vec::new();
    let mut started = false;
    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Started { session } => {
                assert_eq!(session, report.id);
                started = true;
            }
            SessionEvent::StateChanged { state, .. } => states.push(state),
            SessionEvent::Finished(r) => {
                assert_eq!(r, report);
                finished = true;
            }
            SessionEvent::CountdownTick { .. } => {}
        }
    }

    assert!(started && finished);
    assert_eq!(
        states,
        vec![
            SessionState::Selecting,
            SessionState::Countdown,
            SessionState::Recording,
            SessionState::Encoding,
            SessionState::Completed,
        ]
    );
}

#[tokio::test]
async fn test_countdown_ticks_are_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), RECORD_OK, ENCODE_OK);
    let mut h = build(dir, &ffmpeg, ScriptedSurface::dragging(), RecordingUploader::new());
    let config = h.orchestrator.config().clone().with_countdown(1);
    let deps = CaptureDependencies {
        surface: h.surface.clone(),
        uploader: h.uploader.clone(),
    };
    h.orchestrator = CaptureOrchestrator::with_managers(
        config,
        deps,
        RecorderProcessManager::new(&ffmpeg, h.dir.path()),
        EncoderProcessManager::new(&ffmpeg),
    );
    let mut events = h.orchestrator.subscribe();

    let report = h.orchestrator.run_once().await.unwrap();
    assert!(matches!(report.outcome, SessionOutcome::Completed { .. }));

    let mut ticks = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::CountdownTick { remaining, .. } = event {
            ticks.push(remaining);
        }
    }
    assert_eq!(ticks, vec![0]);
    assert_eq!(h.surface.countdown_inits.lock()[0].duration_secs, 1);
}
