//! Observer lifecycle state.

use serde::{Deserialize, Serialize};

use super::ObserverError;

/// Lifecycle state of an observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    Observing,
}

/// Start/stop contract shared by every observer.
///
/// Both calls fail fast when a required permission is missing. Repeated
/// starts and stops are harmless: they never register twice.
pub trait ObservableSession {
    /// Register with the underlying platform feed.
    ///
    /// # Errors
    ///
    /// Returns `ObserverError::PermissionDenied` when the host has not
    /// granted the observer's permissions, or a platform error when the
    /// registration is refused.
    fn start_observing(&mut self) -> Result<(), ObserverError>;

    /// Unregister from the platform feed.
    ///
    /// # Errors
    ///
    /// Implementations report platform teardown failures.
    fn stop_observing(&mut self) -> Result<(), ObserverError>;

    /// Current lifecycle state.
    fn state(&self) -> SessionState;
}

/// Tracks the Idle/Observing transition for one observer.
#[derive(Debug, Clone)]
pub struct ObserverSession {
    name: &'static str,
    state: SessionState,
}

impl ObserverSession {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: SessionState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.state == SessionState::Observing
    }

    /// Move to `Observing`. Returns `false` (and logs) if already there.
    pub fn begin(&mut self) -> bool {
        if self.is_observing() {
            tracing::debug!(observer = self.name, "Already observing, ignoring start");
            return false;
        }
        self.transition(SessionState::Observing);
        true
    }

    /// Move to `Idle`. Returns `false` (and logs) if already there.
    pub fn end(&mut self) -> bool {
        if !self.is_observing() {
            tracing::debug!(observer = self.name, "Not observing, ignoring stop");
            return false;
        }
        self.transition(SessionState::Idle);
        true
    }

    fn transition(&mut self, new_state: SessionState) {
        tracing::debug!(observer = self.name, from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }
}
