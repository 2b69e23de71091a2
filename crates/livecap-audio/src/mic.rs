//! cpal-backed microphone source.
//!
//! The cpal `Stream` is not `Send`, so the stream lives on a dedicated
//! capture thread; `open` hands the negotiated format back over a
//! rendezvous channel. `close` only signals shutdown — the retired worker
//! is reaped on the next `open` or on drop, because joining it inline can
//! deadlock when `close` runs on the stream-callback thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::source::{AudioFormat, AudioFrame, AudioSource, CaptureConfig, FrameSink};
use livecap_foundation::AudioError;

const OPEN_TIMEOUT: Duration = Duration::from_secs(3);

/// Names of the input devices the default host currently exposes.
pub fn input_device_names() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
    }
    names
}

pub struct MicSource {
    device_name: Option<String>,
    worker: Option<CaptureWorker>,
    // Signalled but not yet joined; see `close`.
    retired: Option<CaptureWorker>,
}

struct CaptureWorker {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl MicSource {
    /// Capture from the host's default input device.
    pub fn new() -> Self {
        Self {
            device_name: None,
            worker: None,
            retired: None,
        }
    }

    /// Capture from a specific input device by name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            worker: None,
            retired: None,
        }
    }

    /// Join the worker retired by the last `close`. Runs on the owning
    /// thread (open/drop), never on a stream callback.
    fn reap_retired(&mut self) {
        if let Some(worker) = self.retired.take() {
            let _ = worker.handle.join();
            tracing::debug!("Retired capture worker reaped");
        }
    }
}

impl Default for MicSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MicSource {
    fn open(&mut self, config: &CaptureConfig, sink: FrameSink) -> Result<AudioFormat, AudioError> {
        if self.worker.is_some() {
            return Err(AudioError::AlreadyOpen);
        }
        // The previous worker must be gone before the device is reacquired.
        self.reap_retired();

        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let device_name = self.device_name.clone();
        let frame_size = config.frame_size;
        let thread_shutdown = shutdown.clone();

        let handle = thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match build_capture(device_name.as_deref(), frame_size, sink) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while !thread_shutdown.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(50));
                }
                // Dropping the stream removes the device tap.
                drop(stream);
                tracing::debug!("Capture thread shut down");
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn capture thread: {e}")))?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(format)) => {
                tracing::info!(
                    rate = format.sample_rate_hz,
                    channels = format.channels,
                    frame_size,
                    "Microphone opened"
                );
                self.worker = Some(CaptureWorker { handle, shutdown });
                Ok(format)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                shutdown.store(true, Ordering::Relaxed);
                let _ = handle.join();
                Err(AudioError::Fatal(
                    "Timed out waiting for audio device".to_string(),
                ))
            }
        }
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown.store(true, Ordering::Relaxed);
            // Frame callbacks run on cpal's stream thread, and dropping the
            // stream synchronizes with that thread. A subscriber may call
            // stop() from inside a transcript callback, which lands here on
            // that very thread: joining the worker would then deadlock
            // (worker waits for the callback to return, callback waits for
            // the worker). Signal only; the worker is reaped later.
            self.retired = Some(worker);
            tracing::info!("Microphone release signalled");
        }
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.close();
        self.reap_retired();
    }
}

fn build_capture(
    device_name: Option<&str>,
    frame_size: usize,
    sink: FrameSink,
) -> Result<(Stream, AudioFormat), AudioError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()
            .ok()
            .and_then(|mut devices| {
                devices.find(|d| d.name().map(|n| n == name).unwrap_or(false))
            })
            .ok_or(AudioError::DeviceUnavailable {
                name: Some(name.to_string()),
            })?,
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceUnavailable { name: None })?,
    };

    let default_config = device
        .default_input_config()
        .map_err(|_| AudioError::DeviceUnavailable {
            name: device.name().ok(),
        })?;
    let sample_format = default_config.sample_format();
    let config: StreamConfig = default_config.into();
    let format = AudioFormat {
        sample_rate_hz: config.sample_rate.0,
        channels: config.channels,
    };

    let mut acc = FrameAccumulator::new(frame_size, format);
    let err_fn = |err: cpal::StreamError| {
        tracing::error!("Audio stream error: {err}");
    };

    let stream = match sample_format {
        SampleFormat::I16 => device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &_| acc.push(data, &sink),
                err_fn,
                None,
            )
            .map_err(build_stream_err)?,
        SampleFormat::F32 => {
            let mut convert = Vec::new();
            device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &_| {
                        convert.clear();
                        convert.reserve(data.len());
                        convert.extend(data.iter().map(|&s| f32_to_i16(s)));
                        acc.push(&convert, &sink);
                    },
                    err_fn,
                    None,
                )
                .map_err(build_stream_err)?
        }
        SampleFormat::U16 => {
            let mut convert = Vec::new();
            device
                .build_input_stream(
                    &config,
                    move |data: &[u16], _: &_| {
                        convert.clear();
                        convert.reserve(data.len());
                        convert.extend(data.iter().map(|&s| u16_to_i16(s)));
                        acc.push(&convert, &sink);
                    },
                    err_fn,
                    None,
                )
                .map_err(build_stream_err)?
        }
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{other:?}"),
            });
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::Fatal(format!("Failed to start input stream: {e}")))?;

    Ok((stream, format))
}

fn build_stream_err(e: cpal::BuildStreamError) -> AudioError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => {
            AudioError::DeviceUnavailable { name: None }
        }
        other => AudioError::Fatal(format!("Failed to build input stream: {other}")),
    }
}

#[inline]
fn f32_to_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

#[inline]
fn u16_to_i16(s: u16) -> i16 {
    (s as i32 - 32768) as i16
}

/// Re-chunks irregular device callbacks into exact `frame_size` frames.
struct FrameAccumulator {
    frame_size: usize,
    format: AudioFormat,
    pending: Vec<i16>,
}

impl FrameAccumulator {
    fn new(frame_size: usize, format: AudioFormat) -> Self {
        Self {
            frame_size,
            format,
            pending: Vec::with_capacity(frame_size * 2),
        }
    }

    fn push(&mut self, samples: &[i16], sink: &FrameSink) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.frame_size {
            let rest = self.pending.split_off(self.frame_size);
            let samples = std::mem::replace(&mut self.pending, rest);
            sink(AudioFrame {
                samples,
                timestamp: Instant::now(),
                format: self.format,
            });
        }
    }
}
