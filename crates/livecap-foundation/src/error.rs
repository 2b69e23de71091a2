use thiserror::Error;

use crate::state::SessionState;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device unavailable: {name:?}")]
    DeviceUnavailable { name: Option<String> },

    #[error("Audio source already open")]
    AlreadyOpen,

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Fatal audio error: {0}")]
    Fatal(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Backend stream error [{code}]: {message}")]
    Stream { code: String, message: String },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(#[from] AudioError),

    #[error("Recognition backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Invalid state for {operation}: session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl SessionError {
    /// Construction-time failures leave the session in `Stopping`; everything
    /// else is reported asynchronously and never forces a transition.
    pub fn is_start_failure(&self) -> bool {
        matches!(
            self,
            SessionError::DeviceUnavailable(_) | SessionError::BackendUnavailable { .. }
        )
    }
}
