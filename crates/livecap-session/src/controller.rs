use parking_lot::Mutex;
use tracing::debug;

use crate::session::TranscriptionSession;
use livecap_foundation::{LanguageTag, SessionError, SessionState};

/// Thin host-facing layer: one toggle, one language selector.
///
/// This is the piece a UI binds its button and segmented control to. The
/// selected language is only picked up by the next start; a running session
/// keeps the language it was started with.
pub struct SessionController {
    session: TranscriptionSession,
    selected: Mutex<LanguageTag>,
}

impl SessionController {
    pub fn new(session: TranscriptionSession, language: LanguageTag) -> Self {
        Self {
            session,
            selected: Mutex::new(language),
        }
    }

    /// Record the user's language choice for the next start.
    pub fn set_language(&self, language: LanguageTag) {
        debug!(%language, "Language selected");
        *self.selected.lock() = language;
    }

    pub fn language(&self) -> LanguageTag {
        *self.selected.lock()
    }

    /// Flip between stopping and listening; returns the new state.
    pub fn toggle(&self) -> Result<SessionState, SessionError> {
        match self.session.state() {
            SessionState::Stopping => {
                let language = *self.selected.lock();
                self.session.start(language)?;
            }
            SessionState::Listening => {
                self.session.stop()?;
            }
        }
        Ok(self.session.state())
    }

    pub fn session(&self) -> &TranscriptionSession {
        &self.session
    }
}
