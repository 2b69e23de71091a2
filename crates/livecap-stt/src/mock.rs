//! Mock recognition backend for tests and the dev harness.
//!
//! The mock emits scripted events synchronously from `feed`/`end_audio` and
//! records every call, so tests can assert ordering (e.g. that an old stream
//! was cancelled before a new one was created). `emit` delivers an event for
//! any handle, including cancelled ones, to exercise stale-event filtering.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::backend::{EventSink, RecognitionBackend, StreamHandle, TranscriptEvent};
use crate::next_stream_id;
use livecap_audio::AudioFrame;
use livecap_foundation::{BackendError, LanguageTag};

/// What the mock emits on its own.
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    /// Emitted in order, one per fed frame, until exhausted.
    pub per_frame: Vec<TranscriptEvent>,
    /// Emitted on `end_audio`, modeling a backend's final flush.
    pub on_end: Option<TranscriptEvent>,
}

/// One entry per backend call, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOp {
    Created(StreamHandle),
    Fed(StreamHandle),
    Ended(StreamHandle),
    Cancelled(StreamHandle),
}

#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub handle: StreamHandle,
    pub language: LanguageTag,
    pub partial_results: bool,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    script: MockScript,
    fail_create: Option<String>,
    streams: Vec<StreamRecord>,
    // Sinks outlive cancel so tests can emit late events for dead handles.
    sinks: HashMap<StreamHandle, EventSink>,
    cursors: HashMap<StreamHandle, usize>,
    frames: HashMap<StreamHandle, usize>,
    ops: Vec<MockOp>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: MockScript) -> Self {
        let backend = Self::default();
        backend.inner.lock().script = script;
        backend
    }

    /// Every `create_stream` fails with `BackendError::Unavailable`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let backend = Self::default();
        backend.inner.lock().fail_create = Some(reason.into());
        backend
    }

    /// Deliver an event for `handle`, live or not. Test control.
    pub fn emit(&self, handle: StreamHandle, event: TranscriptEvent) {
        let sink = self.inner.lock().sinks.get(&handle).cloned();
        if let Some(sink) = sink {
            sink(handle, Ok(event));
        }
    }

    /// Deliver a mid-stream error for `handle`. Test control.
    pub fn emit_error(&self, handle: StreamHandle, error: BackendError) {
        let sink = self.inner.lock().sinks.get(&handle).cloned();
        if let Some(sink) = sink {
            sink(handle, Err(error));
        }
    }

    pub fn streams(&self) -> Vec<StreamRecord> {
        self.inner.lock().streams.clone()
    }

    pub fn ops(&self) -> Vec<MockOp> {
        self.inner.lock().ops.clone()
    }

    pub fn cancelled(&self) -> Vec<StreamHandle> {
        self.inner
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                MockOp::Cancelled(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub fn ended(&self) -> Vec<StreamHandle> {
        self.inner
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                MockOp::Ended(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub fn frames_fed(&self, handle: StreamHandle) -> usize {
        self.inner.lock().frames.get(&handle).copied().unwrap_or(0)
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().ops.len()
    }
}

impl RecognitionBackend for MockBackend {
    fn create_stream(
        &self,
        language: LanguageTag,
        partial_results: bool,
        sink: EventSink,
    ) -> Result<StreamHandle, BackendError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.fail_create {
            return Err(BackendError::Unavailable {
                reason: reason.clone(),
            });
        }
        let handle = next_stream_id();
        debug!(stream = %handle, %language, "Mock stream created");
        inner.streams.push(StreamRecord {
            handle,
            language,
            partial_results,
        });
        inner.sinks.insert(handle, sink);
        inner.ops.push(MockOp::Created(handle));
        Ok(handle)
    }

    fn feed(&self, handle: StreamHandle, _frame: AudioFrame) {
        let emit = {
            let mut inner = self.inner.lock();
            inner.ops.push(MockOp::Fed(handle));
            *inner.frames.entry(handle).or_insert(0) += 1;
            let index = *inner.cursors.entry(handle).or_insert(0);
            if index < inner.script.per_frame.len() {
                inner.cursors.insert(handle, index + 1);
                let event = inner.script.per_frame[index].clone();
                inner.sinks.get(&handle).cloned().map(|sink| (sink, event))
            } else {
                None
            }
        };
        // Emit with the lock released; the sink may call back into the mock.
        if let Some((sink, event)) = emit {
            sink(handle, Ok(event));
        }
    }

    fn end_audio(&self, handle: StreamHandle) {
        let emit = {
            let mut inner = self.inner.lock();
            inner.ops.push(MockOp::Ended(handle));
            let flush = inner.script.on_end.clone();
            flush.and_then(|event| inner.sinks.get(&handle).cloned().map(|sink| (sink, event)))
        };
        if let Some((sink, event)) = emit {
            sink(handle, Ok(event));
        }
    }

    fn cancel(&self, handle: StreamHandle) {
        let mut inner = self.inner.lock();
        debug!(stream = %handle, "Mock stream cancelled");
        inner.ops.push(MockOp::Cancelled(handle));
    }
}
