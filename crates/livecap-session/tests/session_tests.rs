//! Session state-machine and event-routing tests.
//!
//! The session is driven end to end with a scripted audio source and the
//! mock backend: tests push frames by hand and observe what reaches the
//! subscriber.

use parking_lot::Mutex;
use std::sync::Arc;

use livecap_audio::{AudioSource, ScriptedSource};
use livecap_foundation::{BackendError, LanguageTag, SessionError, SessionState};
use livecap_session::{SessionController, TranscriptionSession};
use livecap_stt::{MockBackend, MockOp, MockScript, TranscriptEvent};

fn partial(text: &str) -> TranscriptEvent {
    TranscriptEvent::Partial { text: text.into() }
}

fn final_(text: &str) -> TranscriptEvent {
    TranscriptEvent::Final { text: text.into() }
}

fn session_with(script: MockScript) -> (TranscriptionSession, ScriptedSource, MockBackend) {
    let source = ScriptedSource::new();
    let probe = source.clone();
    let backend = MockBackend::with_script(script);
    let session = TranscriptionSession::new(Box::new(source), Arc::new(backend.clone()));
    (session, probe, backend)
}

/// Records every event plus a replace-not-append display, the way a text
/// view consumes the stream.
fn recording_display(
    session: &TranscriptionSession,
) -> (Arc<Mutex<Vec<(String, bool)>>>, Arc<Mutex<String>>) {
    let seen: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let display = Arc::new(Mutex::new(String::new()));
    let seen_in = seen.clone();
    let display_in = display.clone();
    session.on_transcript(Arc::new(move |event| {
        seen_in
            .lock()
            .push((event.text().to_string(), event.is_final()));
        *display_in.lock() = event.text().to_string();
    }));
    (seen, display)
}

#[test]
fn start_opens_device_and_stream() {
    let (session, probe, backend) = session_with(MockScript::default());
    session.start(LanguageTag::EnUs).unwrap();

    assert_eq!(session.state(), SessionState::Listening);
    assert_eq!(session.language(), Some(LanguageTag::EnUs));
    assert!(probe.is_open());

    let streams = backend.streams();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].language, LanguageTag::EnUs);
    assert!(streams[0].partial_results);
}

#[test]
fn start_twice_cancels_old_stream_before_creating_new() {
    let (session, probe, backend) = session_with(MockScript::default());
    session.start(LanguageTag::EnUs).unwrap();
    session.start(LanguageTag::EnUs).unwrap();

    let streams = backend.streams();
    assert_eq!(streams.len(), 2);
    let (old, new) = (streams[0].handle, streams[1].handle);
    assert_ne!(old, new);

    // The old stream was cancelled before the new one existed.
    let ops = backend.ops();
    let cancel_at = ops
        .iter()
        .position(|op| *op == MockOp::Cancelled(old))
        .expect("old stream was never cancelled");
    let create_at = ops
        .iter()
        .position(|op| *op == MockOp::Created(new))
        .unwrap();
    assert!(cancel_at < create_at);

    // Device was released and re-acquired; exactly one stream is live.
    assert_eq!(probe.open_calls(), 2);
    assert_eq!(probe.close_calls(), 1);
    assert!(probe.is_open());
    assert_eq!(session.state(), SessionState::Listening);
}

#[test]
fn stop_when_stopped_is_invalid_with_no_side_effects() {
    let (session, probe, backend) = session_with(MockScript::default());

    match session.stop() {
        Err(SessionError::InvalidState { operation, state }) => {
            assert_eq!(operation, "stop");
            assert_eq!(state, SessionState::Stopping);
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }

    assert_eq!(probe.open_calls(), 0);
    assert_eq!(probe.close_calls(), 0);
    assert_eq!(backend.call_count(), 0);
}

#[test]
fn second_stop_after_stop_is_invalid_but_non_fatal() {
    let (session, _probe, _backend) = session_with(MockScript::default());
    session.start(LanguageTag::EnUs).unwrap();
    session.stop().unwrap();
    assert!(matches!(
        session.stop(),
        Err(SessionError::InvalidState { .. })
    ));
    // The session is still usable afterwards.
    session.start(LanguageTag::EnUs).unwrap();
    assert_eq!(session.state(), SessionState::Listening);
}

#[test]
fn partials_then_final_replace_display() {
    let (session, probe, _backend) = session_with(MockScript {
        per_frame: vec![partial("hel"), partial("hello"), final_("hello world")],
        on_end: None,
    });
    let (seen, display) = recording_display(&session);

    session.start(LanguageTag::EnUs).unwrap();
    probe.push_samples(&[0; 2048]);
    probe.push_samples(&[0; 2048]);
    probe.push_samples(&[0; 2048]);

    let seen = seen.lock();
    assert_eq!(
        *seen,
        vec![
            ("hel".to_string(), false),
            ("hello".to_string(), false),
            ("hello world".to_string(), true),
        ]
    );
    // Replace, never concatenate.
    assert_eq!(*display.lock(), "hello world");
}

#[test]
fn live_transcription_scenario_end_to_end() {
    let (session, probe, backend) = session_with(MockScript {
        per_frame: vec![partial("hel"), partial("hello"), final_("hello world")],
        on_end: None,
    });
    let (seen, display) = recording_display(&session);

    session.start(LanguageTag::EnUs).unwrap();
    let handle = backend.streams()[0].handle;

    for _ in 0..3 {
        probe.push_samples(&[0; 2048]);
    }
    assert_eq!(backend.frames_fed(handle), 3);

    session.stop().unwrap();
    assert_eq!(backend.ended(), vec![handle]);
    assert!(!probe.is_open());

    // A late result from the closed stream never reaches the subscriber.
    backend.emit(handle, final_("hello world again"));
    backend.emit_error(
        handle,
        BackendError::Stream {
            code: "net".into(),
            message: "connection reset".into(),
        },
    );

    assert_eq!(seen.lock().len(), 3);
    assert_eq!(*display.lock(), "hello world");
}

#[test]
fn end_audio_flush_after_stop_is_dropped() {
    // The backend flushes a final on end_audio, but stop() clears the handle
    // first, so the flush is filtered as stale.
    let (session, _probe, backend) = session_with(MockScript {
        per_frame: vec![],
        on_end: Some(final_("flushed")),
    });
    let (seen, _display) = recording_display(&session);

    session.start(LanguageTag::EnUs).unwrap();
    let handle = backend.streams()[0].handle;
    session.stop().unwrap();

    assert_eq!(backend.ended(), vec![handle]);
    assert!(seen.lock().is_empty());
}

#[test]
fn events_from_cancelled_stream_are_dropped_after_restart() {
    let (session, probe, backend) = session_with(MockScript {
        per_frame: vec![partial("first")],
        on_end: None,
    });
    let (seen, _display) = recording_display(&session);

    session.start(LanguageTag::EnUs).unwrap();
    let old = backend.streams()[0].handle;
    session.start(LanguageTag::EnUs).unwrap();
    let new = backend.streams()[1].handle;

    // In-flight result for the cancelled stream arrives late.
    backend.emit(old, partial("stale"));
    assert!(seen.lock().is_empty());

    // The live stream still delivers.
    probe.push_samples(&[0; 2048]);
    assert_eq!(*seen.lock(), vec![("first".to_string(), false)]);
    assert_eq!(backend.frames_fed(new), 1);
    assert_eq!(backend.frames_fed(old), 0);
}

#[test]
fn backend_error_is_reported_without_state_change() {
    let (session, _probe, backend) = session_with(MockScript::default());
    let errors: Arc<Mutex<Vec<BackendError>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_in = errors.clone();
    session.on_error(Arc::new(move |error| errors_in.lock().push(error)));

    session.start(LanguageTag::EnUs).unwrap();
    let handle = backend.streams()[0].handle;

    backend.emit_error(
        handle,
        BackendError::Stream {
            code: "auth".into(),
            message: "authorization revoked".into(),
        },
    );

    // Reported, but the session keeps listening; the caller decides.
    assert_eq!(errors.lock().len(), 1);
    assert_eq!(session.state(), SessionState::Listening);
    session.stop().unwrap();
}

#[test]
fn device_failure_leaves_session_stopped() {
    let source = ScriptedSource::failing();
    let probe = source.clone();
    let backend = MockBackend::new();
    let session = TranscriptionSession::new(Box::new(source), Arc::new(backend.clone()));

    match session.start(LanguageTag::EnUs) {
        Err(SessionError::DeviceUnavailable(_)) => {}
        other => panic!("expected DeviceUnavailable, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Stopping);
    assert_eq!(session.language(), None);
    // No stream was ever created.
    assert_eq!(backend.call_count(), 0);
    assert!(!probe.is_open());
}

#[test]
fn backend_failure_releases_device_and_leaves_session_stopped() {
    let source = ScriptedSource::new();
    let probe = source.clone();
    let backend = MockBackend::unavailable("language not supported");
    let session = TranscriptionSession::new(Box::new(source), Arc::new(backend.clone()));

    match session.start(LanguageTag::JaJp) {
        Err(SessionError::BackendUnavailable { reason }) => {
            assert!(reason.contains("language not supported"));
        }
        other => panic!("expected BackendUnavailable, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Stopping);
    // Scoped release: the device was opened, then closed on the error path.
    assert_eq!(probe.open_calls(), 1);
    assert_eq!(probe.close_calls(), 1);
    assert!(!probe.is_open());
}

#[test]
fn stop_from_within_transcript_handler_does_not_deadlock() {
    let (session, probe, _backend) = session_with(MockScript {
        per_frame: vec![final_("done")],
        on_end: None,
    });

    let stop_result: Arc<Mutex<Option<Result<(), SessionError>>>> = Arc::new(Mutex::new(None));
    let result_in = stop_result.clone();
    let reentrant = session.clone();
    session.on_transcript(Arc::new(move |event| {
        if event.is_final() {
            *result_in.lock() = Some(reentrant.stop());
        }
    }));

    session.start(LanguageTag::EnUs).unwrap();
    probe.push_samples(&[0; 2048]);

    assert!(matches!(*stop_result.lock(), Some(Ok(()))));
    assert_eq!(session.state(), SessionState::Stopping);
    assert!(!probe.is_open());
}

#[test]
fn state_subscribers_see_listen_stop_cycle() {
    let (session, _probe, _backend) = session_with(MockScript::default());
    let rx = session.subscribe_state();

    session.start(LanguageTag::EnUs).unwrap();
    session.stop().unwrap();

    assert_eq!(rx.try_recv().unwrap(), SessionState::Listening);
    assert_eq!(rx.try_recv().unwrap(), SessionState::Stopping);
    assert!(rx.try_recv().is_err());
}

// ─── SessionController ──────────────────────────────────────────────

#[test]
fn controller_toggle_flips_state() {
    let (session, _probe, _backend) = session_with(MockScript::default());
    let controller = SessionController::new(session, LanguageTag::EnUs);

    assert_eq!(controller.toggle().unwrap(), SessionState::Listening);
    assert_eq!(controller.toggle().unwrap(), SessionState::Stopping);
}

#[test]
fn language_change_takes_effect_on_next_start_only() {
    let (session, _probe, backend) = session_with(MockScript::default());
    let controller = SessionController::new(session, LanguageTag::EnUs);

    controller.toggle().unwrap();
    controller.set_language(LanguageTag::JaJp);

    // The running stream keeps the language it was started with.
    assert_eq!(
        controller.session().language(),
        Some(LanguageTag::EnUs)
    );
    assert_eq!(backend.streams()[0].language, LanguageTag::EnUs);

    controller.toggle().unwrap();
    controller.toggle().unwrap();
    assert_eq!(backend.streams()[1].language, LanguageTag::JaJp);
    assert_eq!(
        controller.session().language(),
        Some(LanguageTag::JaJp)
    );
}
