//! Boundary to the platform location stack.

use std::collections::BTreeMap;

use crate::session::{CallbackSink, ListenerHandle, PlatformError};

use super::gnss::{GnssHardware, GnssMeasurementsEvent, GnssStatus, NavigationMessage};
use super::types::{Location, LocationRequest};

/// Raw callbacks the location stack delivers to the observer.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationCallback {
    /// A fix (or the absence of a cached one).
    LocationChanged(Option<Location>),
    /// Engine session started.
    GnssStarted,
    /// Engine session stopped.
    GnssStopped,
    /// First fix of the engine session.
    FirstFix { ttff_ms: u32 },
    /// Satellite status update.
    SatelliteStatus(GnssStatus),
    /// Raw measurement batch.
    Measurements(GnssMeasurementsEvent),
    /// Navigation message frame.
    NavigationMessage(NavigationMessage),
    /// Broadcast: engine capabilities changed.
    CapabilitiesChanged,
    /// Broadcast: global location switch toggled.
    ModeChanged,
    /// Broadcast: a provider was enabled or disabled.
    ProviderChanged { provider: String, enabled: bool },
}

/// Broadcasts the observer subscribes to while observing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BroadcastAction {
    GnssCapabilitiesChanged,
    ModeChanged,
    ProvidersChanged,
}

impl BroadcastAction {
    pub const ALL: [Self; 3] = [
        Self::GnssCapabilitiesChanged,
        Self::ModeChanged,
        Self::ProvidersChanged,
    ];
}

/// Measurement registration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasurementRequest {
    pub full_tracking: bool,
}

/// The platform location stack: providers, the GNSS engine, and the
/// broadcast side channel.
///
/// Registrations return a handle that identifies the listener for removal.
/// Removing a handle that is no longer registered must be harmless.
pub trait LocationPlatform: Send + Sync + 'static {
    fn has_provider(&self, provider: &str) -> bool;

    fn is_provider_enabled(&self, provider: &str) -> bool;

    /// Currently enabled providers.
    fn enabled_providers(&self) -> Vec<String>;

    /// Global location switch.
    fn is_location_enabled(&self) -> bool;

    fn gnss_hardware(&self) -> GnssHardware;

    fn last_known_location(&self, provider: &str) -> Option<Location>;

    /// # Errors
    ///
    /// Returns a `PlatformError` if the request is refused.
    fn request_location_updates(
        &self,
        provider: &str,
        request: &LocationRequest,
        sink: CallbackSink<LocationCallback>,
    ) -> Result<ListenerHandle, PlatformError>;

    fn remove_location_updates(&self, handle: ListenerHandle);

    /// # Errors
    ///
    /// Returns a `PlatformError` if the engine refuses the listener.
    fn register_gnss_status(
        &self,
        sink: CallbackSink<LocationCallback>,
    ) -> Result<ListenerHandle, PlatformError>;

    fn unregister_gnss_status(&self, handle: ListenerHandle);

    /// # Errors
    ///
    /// Returns a `PlatformError` if measurements are unsupported or refused.
    fn register_gnss_measurements(
        &self,
        request: &MeasurementRequest,
        sink: CallbackSink<LocationCallback>,
    ) -> Result<ListenerHandle, PlatformError>;

    fn unregister_gnss_measurements(&self, handle: ListenerHandle);

    /// # Errors
    ///
    /// Returns a `PlatformError` if navigation messages are unsupported or refused.
    fn register_navigation_messages(
        &self,
        sink: CallbackSink<LocationCallback>,
    ) -> Result<ListenerHandle, PlatformError>;

    fn unregister_navigation_messages(&self, handle: ListenerHandle);

    /// # Errors
    ///
    /// Returns a `PlatformError` if the receiver cannot be registered.
    fn register_broadcasts(
        &self,
        actions: &[BroadcastAction],
        sink: CallbackSink<LocationCallback>,
    ) -> Result<ListenerHandle, PlatformError>;

    fn unregister_broadcasts(&self, handle: ListenerHandle);

    /// # Errors
    ///
    /// Returns a `PlatformError` if the provider rejects the command.
    fn send_extra_command(
        &self,
        provider: &str,
        command: &str,
        extras: &BTreeMap<String, bool>,
    ) -> Result<(), PlatformError>;
}
