use livecap_foundation::AudioError;
use std::sync::Arc;
use std::time::Instant;

/// Native format the device was opened with. The core never resamples;
/// whatever the device produces is what the backend receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate_hz: u32,
    pub channels: u16,
}

/// One fixed-size chunk of captured audio. Produced by an [`AudioSource`],
/// consumed exactly once by the active recognition stream.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub timestamp: Instant,
    pub format: AudioFormat,
}

#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// Samples per delivered frame, regardless of the device callback size.
    pub frame_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { frame_size: 2048 }
    }
}

/// Frames are pushed into the sink from the capture thread as they fill.
pub type FrameSink = Arc<dyn Fn(AudioFrame) + Send + Sync>;

/// Capability trait for a microphone-like input.
///
/// Exactly one stream may be open at a time; a second `open` fails with
/// [`AudioError::AlreadyOpen`]. `close` is idempotent and releases the device
/// deterministically, including on error paths during session start.
pub trait AudioSource: Send {
    /// Acquire the device at its native format and begin pushing frames of
    /// `config.frame_size` samples into `sink`.
    fn open(&mut self, config: &CaptureConfig, sink: FrameSink) -> Result<AudioFormat, AudioError>;

    /// Stop frame production and release the device. Safe to call twice.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}
