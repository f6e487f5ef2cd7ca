//! GNSS engine session state machine.
//!
//! Phases move only on engine callbacks. Measurement and navigation-message
//! feeds are dependents of the engine session: they may only be registered
//! once the engine reports `Started`, and they are torn down before the
//! status listener they depend on.

use serde::{Deserialize, Serialize};

use crate::session::ListenerHandle;

use super::types::LocationOptions;

/// Engine session phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GnssPhase {
    #[default]
    Stopped,
    Started,
    Tracking { ttff_ms: u32 },
}

/// Generation of a locating request. Callbacks carry the id of the request
/// whose registrations produced them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl GnssPhase {
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// What the observer is currently locating for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveRequest {
    #[default]
    None,
    /// Single or track request registered with the platform.
    Live(LocationOptions),
    /// Last-known fix queued for republishing.
    PendingLast,
}

/// Listener handles, in dependency order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registrations {
    pub updates: Option<ListenerHandle>,
    pub status: Option<ListenerHandle>,
    pub measurements: Option<ListenerHandle>,
    pub navigation: Option<ListenerHandle>,
}

/// Handles to unregister, already ordered for teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Teardown {
    pub updates: Option<ListenerHandle>,
    pub navigation: Option<ListenerHandle>,
    pub measurements: Option<ListenerHandle>,
    pub status: Option<ListenerHandle>,
    /// The engine session was active and ends with this teardown.
    pub ends_engine_session: bool,
}

impl Teardown {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Engine phase plus the registrations of the active locating request.
#[derive(Debug, Clone)]
pub struct EngineSession {
    phase: GnssPhase,
    request: ActiveRequest,
    registrations: Registrations,
    last_full_tracking: bool,
    current: RequestId,
}

impl Default for EngineSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: GnssPhase::Stopped,
            request: ActiveRequest::None,
            registrations: Registrations::default(),
            last_full_tracking: true,
            current: RequestId::default(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> GnssPhase {
        self.phase
    }

    #[must_use]
    pub fn request(&self) -> &ActiveRequest {
        &self.request
    }

    #[must_use]
    pub fn registrations(&self) -> Registrations {
        self.registrations
    }

    /// Allocate the id for the next request. Callbacks tagged with any
    /// earlier id stop counting from here on.
    pub fn next_request(&mut self) -> RequestId {
        self.current = RequestId(self.current.0 + 1);
        self.current
    }

    #[must_use]
    pub fn current_request(&self) -> RequestId {
        self.current
    }

    /// Whether a callback tagged with `id` belongs to the active request.
    #[must_use]
    pub fn is_current(&self, id: RequestId) -> bool {
        id == self.current && self.accepts_locations()
    }

    /// Record a live request and its registrations.
    pub fn begin_live(
        &mut self,
        options: LocationOptions,
        updates: ListenerHandle,
        status: Option<ListenerHandle>,
    ) {
        self.request = ActiveRequest::Live(options);
        self.registrations = Registrations {
            updates: Some(updates),
            status,
            measurements: None,
            navigation: None,
        };
        self.last_full_tracking = true;
    }

    /// Record a queued last-known republish.
    pub fn begin_last(&mut self) {
        self.request = ActiveRequest::PendingLast;
    }

    /// Whether a location callback should reach listeners.
    #[must_use]
    pub fn accepts_locations(&self) -> bool {
        !matches!(self.request, ActiveRequest::None)
    }

    /// Whether the active request tears itself down after the first fix.
    #[must_use]
    pub fn is_single_shot(&self) -> bool {
        match &self.request {
            ActiveRequest::Live(options) => options.mode == super::LocationMode::Single,
            ActiveRequest::PendingLast => true,
            ActiveRequest::None => false,
        }
    }

    /// Engine reported `Started`.
    pub fn on_started(&mut self) {
        self.transition(GnssPhase::Started);
    }

    /// Engine reported its first fix.
    pub fn on_first_fix(&mut self, ttff_ms: u32) {
        self.transition(GnssPhase::Tracking { ttff_ms });
    }

    /// Engine reported `Stopped`. Returns the dependent feeds to drop, since
    /// they cannot outlive the engine session.
    pub fn on_stopped(&mut self) -> Teardown {
        self.transition(GnssPhase::Stopped);
        Teardown {
            navigation: self.registrations.navigation.take(),
            measurements: self.registrations.measurements.take(),
            ..Teardown::default()
        }
    }

    /// Guard for the dependent registration: the engine session must exist
    /// and the status listener must still be ours.
    #[must_use]
    pub fn can_register_dependents(&self) -> bool {
        self.phase.is_active() && self.registrations.status.is_some()
    }

    #[must_use]
    pub fn needs_measurements(&self) -> bool {
        self.can_register_dependents() && self.registrations.measurements.is_none()
    }

    #[must_use]
    pub fn needs_navigation(&self) -> bool {
        self.can_register_dependents() && self.registrations.navigation.is_none()
    }

    pub fn set_measurements(&mut self, handle: ListenerHandle) {
        self.registrations.measurements = Some(handle);
    }

    pub fn set_navigation(&mut self, handle: ListenerHandle) {
        self.registrations.navigation = Some(handle);
    }

    /// Edge detector for the full-tracking flag. Returns the new value only
    /// when it differs from the previous measurement batch.
    pub fn observe_full_tracking(&mut self, full_tracking: bool) -> Option<bool> {
        if full_tracking == self.last_full_tracking {
            return None;
        }
        self.last_full_tracking = full_tracking;
        Some(full_tracking)
    }

    /// End the active request and hand back everything to unregister.
    ///
    /// The status listener leaves with the request, so no `Stopped` callback
    /// can follow; an active engine session is closed here instead.
    pub fn finish(&mut self) -> Teardown {
        self.request = ActiveRequest::None;
        let regs = std::mem::take(&mut self.registrations);
        let ends_engine_session = self.phase.is_active();
        if ends_engine_session {
            self.transition(GnssPhase::Stopped);
        }
        Teardown {
            updates: regs.updates,
            navigation: regs.navigation,
            measurements: regs.measurements,
            status: regs.status,
            ends_engine_session,
        }
    }

    fn transition(&mut self, phase: GnssPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "GNSS phase transition");
        self.phase = phase;
    }
}
