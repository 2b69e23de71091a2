use crate::error::SessionError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Two-state session lifecycle. `Stopping` is the idle/initial state;
/// `Listening` means the device is open and audio is streaming to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Stopping,
    Listening,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Stopping => write!(f, "stopping"),
            SessionState::Listening => write!(f, "listening"),
        }
    }
}

/// Shared session-state cell with validated transitions and a broadcast
/// channel for observers (e.g. an enabled/disabled toggle affordance).
pub struct StateCell {
    state: RwLock<SessionState>,
    state_tx: Sender<SessionState>,
    state_rx: Receiver<SessionState>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: RwLock::new(SessionState::Stopping),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: SessionState) -> Result<(), SessionError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (SessionState::Stopping, SessionState::Listening)
                | (SessionState::Listening, SessionState::Stopping)
        );

        if !valid {
            return Err(SessionError::InvalidState {
                operation: "transition",
                state: *current,
            });
        }

        tracing::debug!("Session state: {} -> {}", *current, new_state);
        *current = new_state;
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> SessionState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> Receiver<SessionState> {
        self.state_rx.clone()
    }
}
