use serde::{Deserialize, Serialize};
use std::sync::Arc;

use livecap_audio::AudioFrame;
use livecap_foundation::{BackendError, LanguageTag};

/// Opaque identity of one recognition stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamHandle(pub(crate) u64);

impl std::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental recognizer output. Each event carries the full utterance text
/// so far; a subscriber replaces its display, never appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TranscriptEvent {
    Partial { text: String },
    Final { text: String },
}

impl TranscriptEvent {
    pub fn text(&self) -> &str {
        match self {
            TranscriptEvent::Partial { text } | TranscriptEvent::Final { text } => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, TranscriptEvent::Final { .. })
    }
}

/// The single ordered callback channel for one stream. Events and errors for
/// a handle are delivered through its sink in emission order, never reordered.
pub type EventSink =
    Arc<dyn Fn(StreamHandle, Result<TranscriptEvent, BackendError>) + Send + Sync>;

/// External recognition capability consumed by the session.
///
/// One stream per session; the session opens a fresh stream on every start
/// and identifies results by handle, so a backend may keep flushing a
/// cancelled stream without confusing anyone.
pub trait RecognitionBackend: Send + Sync {
    /// Open a recognition stream bound to `language`. Fails with
    /// [`BackendError::Unavailable`] when the language is unsupported or
    /// authorization is missing.
    fn create_stream(
        &self,
        language: LanguageTag,
        partial_results: bool,
        sink: EventSink,
    ) -> Result<StreamHandle, BackendError>;

    /// Stream one captured frame. Non-blocking; results arrive via the sink.
    fn feed(&self, handle: StreamHandle, frame: AudioFrame);

    /// No more frames will arrive. The backend may still emit a final event
    /// for the handle before closing the stream.
    fn end_audio(&self, handle: StreamHandle);

    /// Immediate best-effort abort; no final event is guaranteed. Frames
    /// already in flight may still produce events for the old handle.
    fn cancel(&self, handle: StreamHandle);
}
