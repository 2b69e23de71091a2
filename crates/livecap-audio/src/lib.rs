pub mod mic;
pub mod scripted;
pub mod source;

pub use mic::{input_device_names, MicSource};
pub use scripted::ScriptedSource;
pub use source::{AudioFormat, AudioFrame, AudioSource, CaptureConfig, FrameSink};
