//! Recognition backend abstraction for LiveCap
//!
//! This crate defines the capability a session consumes: a backend accepts
//! streamed audio frames per stream handle and pushes transcript events (or
//! errors) through a single ordered sink per handle. No recognition engine
//! ships here; [`mock::MockBackend`] serves tests and development.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod backend;
pub mod mock;

pub use backend::{EventSink, RecognitionBackend, StreamHandle, TranscriptEvent};
pub use mock::{MockBackend, MockOp, MockScript, StreamRecord};

static STREAM_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique stream handle. Handle identity is what the session uses
/// to discard events from cancelled or closed streams.
pub fn next_stream_id() -> StreamHandle {
    StreamHandle(STREAM_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
}
