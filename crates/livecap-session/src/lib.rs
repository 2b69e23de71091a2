//! Live transcription session orchestration
//!
//! [`TranscriptionSession`] wires an audio source to a recognition backend
//! and owns the two-state lifecycle (stopping/listening). The thin
//! [`SessionController`] on top translates user intent (toggle, language
//! selection) into session calls; it is the boundary a host UI talks to.

pub mod controller;
pub mod session;

pub use controller::SessionController;
pub use session::{ErrorHandler, TranscriptHandler, TranscriptionSession};
