use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use livecap_audio::{AudioSource, CaptureConfig, FrameSink};
use livecap_foundation::{BackendError, LanguageTag, SessionError, SessionState, StateCell};
use livecap_stt::{EventSink, RecognitionBackend, StreamHandle, TranscriptEvent};

pub type TranscriptHandler = Arc<dyn Fn(TranscriptEvent) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(BackendError) + Send + Sync>;

/// Coordinates one audio source and one recognition backend.
///
/// At most one recognition stream is live at a time. Starting while already
/// listening first runs the full stop sequence; events that arrive for a
/// cancelled or closed stream are dropped by handle identity. Handlers are
/// always invoked with no internal lock held, so calling [`stop`] from inside
/// a transcript or error callback is safe.
///
/// [`stop`]: TranscriptionSession::stop
#[derive(Clone)]
pub struct TranscriptionSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    backend: Arc<dyn RecognitionBackend>,
    // Also serializes start/stop against each other.
    audio: Mutex<Box<dyn AudioSource>>,
    capture: CaptureConfig,
    state: StateCell,
    active: Mutex<Option<StreamHandle>>,
    language: Mutex<Option<LanguageTag>>,
    on_transcript: RwLock<Option<TranscriptHandler>>,
    on_error: RwLock<Option<ErrorHandler>>,
}

impl TranscriptionSession {
    pub fn new(audio: Box<dyn AudioSource>, backend: Arc<dyn RecognitionBackend>) -> Self {
        Self::with_capture_config(audio, backend, CaptureConfig::default())
    }

    pub fn with_capture_config(
        audio: Box<dyn AudioSource>,
        backend: Arc<dyn RecognitionBackend>,
        capture: CaptureConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                backend,
                audio: Mutex::new(audio),
                capture,
                state: StateCell::new(),
                active: Mutex::new(None),
                language: Mutex::new(None),
                on_transcript: RwLock::new(None),
                on_error: RwLock::new(None),
            }),
        }
    }

    /// Open the device and a recognition stream bound to `language`.
    ///
    /// On failure the session stays in `Stopping` and the device is released.
    pub fn start(&self, language: LanguageTag) -> Result<(), SessionError> {
        let mut audio = self.inner.audio.lock();

        if self.inner.state.current() == SessionState::Listening {
            debug!("start() while listening; running stop sequence first");
            self.halt(&mut audio);
        }

        // Cancel-before-start: clear any stale handle so in-flight results
        // for it are discarded, then tell the backend to abort it.
        if let Some(old) = self.inner.active.lock().take() {
            self.inner.backend.cancel(old);
        }

        let weak = Arc::downgrade(&self.inner);
        let frame_sink: FrameSink = Arc::new(move |frame| {
            if let Some(inner) = weak.upgrade() {
                let handle = *inner.active.lock();
                if let Some(handle) = handle {
                    inner.backend.feed(handle, frame);
                }
            }
        });
        let format = audio.open(&self.inner.capture, frame_sink)?;

        let weak = Arc::downgrade(&self.inner);
        let event_sink: EventSink = Arc::new(move |handle, result| {
            if let Some(inner) = weak.upgrade() {
                inner.deliver(handle, result);
            }
        });
        let handle = match self.inner.backend.create_stream(language, true, event_sink) {
            Ok(handle) => handle,
            Err(e) => {
                // Scoped acquisition: the device never outlives a failed start.
                audio.close();
                return Err(SessionError::BackendUnavailable {
                    reason: e.to_string(),
                });
            }
        };

        *self.inner.active.lock() = Some(handle);
        *self.inner.language.lock() = Some(language);
        self.inner.state.transition(SessionState::Listening)?;
        info!(
            stream = %handle,
            %language,
            rate = format.sample_rate_hz,
            channels = format.channels,
            "Transcription session started"
        );
        Ok(())
    }

    /// Stop capturing, flush the backend stream, and return to `Stopping`.
    ///
    /// Calling while already stopped returns `InvalidState` and performs no
    /// device or backend calls.
    pub fn stop(&self) -> Result<(), SessionError> {
        if self.inner.state.current() != SessionState::Listening {
            return Err(SessionError::InvalidState {
                operation: "stop",
                state: self.inner.state.current(),
            });
        }
        let mut audio = self.inner.audio.lock();
        // Re-check under the lock; a concurrent stop may have won.
        if self.inner.state.current() != SessionState::Listening {
            return Err(SessionError::InvalidState {
                operation: "stop",
                state: self.inner.state.current(),
            });
        }

        audio.close();
        // Clear the handle before signalling end-of-audio: whatever the
        // backend still flushes for this stream is dropped as stale.
        if let Some(handle) = self.inner.active.lock().take() {
            self.inner.backend.end_audio(handle);
        }
        *self.inner.language.lock() = None;
        self.inner.state.transition(SessionState::Stopping)?;
        info!("Transcription session stopped");
        Ok(())
    }

    /// Register the transcript callback. Each event carries the full text so
    /// far; the latest event replaces whatever was displayed before.
    pub fn on_transcript(&self, handler: TranscriptHandler) {
        *self.inner.on_transcript.write() = Some(handler);
    }

    /// Register the error callback for asynchronous backend failures. These
    /// do not change session state; the caller decides whether to stop.
    pub fn on_error(&self, handler: ErrorHandler) {
        *self.inner.on_error.write() = Some(handler);
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.current()
    }

    pub fn subscribe_state(&self) -> crossbeam_channel::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Language the running stream is bound to; `None` while stopped.
    pub fn language(&self) -> Option<LanguageTag> {
        *self.inner.language.lock()
    }

    /// Stop sequence used when a start interrupts a live session: release
    /// the device and cancel (rather than flush) the old stream.
    fn halt(&self, audio: &mut Box<dyn AudioSource>) {
        audio.close();
        if let Some(handle) = self.inner.active.lock().take() {
            self.inner.backend.cancel(handle);
        }
        *self.inner.language.lock() = None;
        if self.inner.state.transition(SessionState::Stopping).is_err() {
            warn!("halt() called while already stopped");
        }
    }
}

impl SessionInner {
    fn deliver(&self, handle: StreamHandle, result: Result<TranscriptEvent, BackendError>) {
        {
            let active = self.active.lock();
            if *active != Some(handle) {
                trace!(stream = %handle, "Dropping event for stale stream");
                return;
            }
        }
        // Handlers run with no lock held so they may call stop().
        match result {
            Ok(event) => {
                let handler = self.on_transcript.read().clone();
                if let Some(handler) = handler {
                    handler(event);
                }
            }
            Err(error) => {
                warn!(stream = %handle, %error, "Backend reported stream error");
                let handler = self.on_error.read().clone();
                if let Some(handler) = handler {
                    handler(error);
                }
            }
        }
    }
}
