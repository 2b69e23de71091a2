//! Scripted audio source for tests and backend-less development.
//!
//! Frames are injected by hand with [`ScriptedSource::push_samples`]; the
//! source records open/close calls so tests can assert on device side
//! effects. Clones share state, so a test can keep a probe handle after
//! handing the source to a session.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

use crate::source::{AudioFormat, AudioFrame, AudioSource, CaptureConfig, FrameSink};
use livecap_foundation::AudioError;

#[derive(Clone)]
pub struct ScriptedSource {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    format: AudioFormat,
    fail_open: bool,
    sink: Option<FrameSink>,
    open: bool,
    open_calls: u32,
    close_calls: u32,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::with_format(AudioFormat {
            sample_rate_hz: 48_000,
            channels: 1,
        })
    }

    pub fn with_format(format: AudioFormat) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                format,
                fail_open: false,
                sink: None,
                open: false,
                open_calls: 0,
                close_calls: 0,
            })),
        }
    }

    /// Every `open` fails with `DeviceUnavailable` until cleared.
    pub fn failing() -> Self {
        let source = Self::new();
        source.inner.lock().fail_open = true;
        source
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.inner.lock().fail_open = fail;
    }

    /// Deliver one frame to the installed sink. Frames pushed while the
    /// source is closed are dropped, mirroring a released device tap.
    pub fn push_samples(&self, samples: &[i16]) {
        let (sink, format) = {
            let inner = self.inner.lock();
            if !inner.open {
                tracing::trace!("Dropping pushed samples; source closed");
                return;
            }
            (inner.sink.clone(), inner.format)
        };
        // Invoke outside the lock: the sink may re-enter this source.
        if let Some(sink) = sink {
            sink(AudioFrame {
                samples: samples.to_vec(),
                timestamp: Instant::now(),
                format,
            });
        }
    }

    pub fn open_calls(&self) -> u32 {
        self.inner.lock().open_calls
    }

    pub fn close_calls(&self) -> u32 {
        self.inner.lock().close_calls
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for ScriptedSource {
    fn open(&mut self, _config: &CaptureConfig, sink: FrameSink) -> Result<AudioFormat, AudioError> {
        let mut inner = self.inner.lock();
        inner.open_calls += 1;
        if inner.open {
            return Err(AudioError::AlreadyOpen);
        }
        if inner.fail_open {
            return Err(AudioError::DeviceUnavailable { name: None });
        }
        inner.open = true;
        inner.sink = Some(sink);
        Ok(inner.format)
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock();
        inner.close_calls += 1;
        inner.open = false;
        inner.sink = None;
    }

    fn is_open(&self) -> bool {
        self.inner.lock().open
    }
}
