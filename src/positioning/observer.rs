//! Positioning observer: locating modes, GNSS engine lifecycle and the
//! provider/capability broadcast side channel.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::config::PositioningConfig;
use crate::session::{
    require_any, CallbackSink, ListenerHandle, ObservableSession, ObserverError, ObserverSession,
    Permission, PermissionCheck, Precondition, SessionState, TaskQueue,
};

use super::engine::{ActiveRequest, EngineSession, GnssPhase, RequestId, Teardown};
use super::gnss::{GnssHardware, GnssMeasurementsEvent, GnssStatus, NavigationMessage};
use super::platform::{BroadcastAction, LocationCallback, LocationPlatform, MeasurementRequest};
use super::types::{
    AidingDataCategory, Location, LocationMode, LocationOptions, LocationRequest, Quality,
    DELETE_AIDING_DATA_COMMAND, GPS_PROVIDER,
};

const LOCATION_PERMISSIONS: [Permission; 2] = [Permission::FineLocation, Permission::CoarseLocation];

/// Events published to positioning listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum PositioningEvent {
    LocationModeChanged(bool),
    ProvidersChanged(Vec<String>),
    GnssCapabilitiesChanged(GnssHardware),
    /// A fix; `None` when last-known mode had nothing cached.
    LocationChanged(Option<Location>),
    GnssStarted,
    FirstFix { ttff_ms: u32 },
    SatelliteStatusChanged(GnssStatus),
    MeasurementsReceived(GnssMeasurementsEvent),
    NavigationMessageReceived(NavigationMessage),
    FullTrackingChanged(bool),
    GnssStopped,
}

/// Work items for the callback queue.
#[derive(Debug)]
enum Work {
    /// Broadcast receiver callbacks.
    Callback(LocationCallback),
    /// Callbacks from the registrations of one locating request.
    Request(RequestId, LocationCallback),
    RefreshProviders,
}

struct Shared<P> {
    platform: Arc<P>,
    engine: Mutex<EngineSession>,
    events: mpsc::UnboundedSender<PositioningEvent>,
    force_full_tracking: AtomicBool,
}

impl<P: LocationPlatform> Shared<P> {
    fn engine(&self) -> MutexGuard<'_, EngineSession> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PositioningEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Positioning listener gone, dropping event");
        }
    }

    /// Unregister in reverse dependency order.
    fn release(&self, teardown: Teardown) {
        if let Some(handle) = teardown.updates {
            self.platform.remove_location_updates(handle);
        }
        if let Some(handle) = teardown.navigation {
            self.platform.unregister_navigation_messages(handle);
        }
        if let Some(handle) = teardown.measurements {
            self.platform.unregister_gnss_measurements(handle);
        }
        if let Some(handle) = teardown.status {
            self.platform.unregister_gnss_status(handle);
        }
        if !teardown.is_empty() {
            tracing::debug!(?teardown, "Released locating registrations");
        }
        if teardown.ends_engine_session {
            self.emit(PositioningEvent::GnssStopped);
        }
    }
}

/// Runs on the callback queue; owns the provider-set diff state.
struct CallbackHandler<P> {
    shared: Arc<Shared<P>>,
    sink: CallbackSink<Work>,
    last_providers: Option<HashSet<String>>,
}

impl<P: LocationPlatform> CallbackHandler<P> {
    fn handle(&mut self, work: Work) {
        match work {
            Work::RefreshProviders => self.refresh_providers(),
            Work::Callback(callback) => self.handle_callback(callback),
            Work::Request(id, callback) => {
                if self.shared.engine().is_current(id) {
                    self.handle_callback(callback);
                } else {
                    tracing::trace!(?id, "Dropping callback from a finished locating request");
                }
            }
        }
    }

    fn handle_callback(&mut self, callback: LocationCallback) {
        match callback {
            LocationCallback::LocationChanged(location) => self.on_location(location),
            LocationCallback::GnssStarted => self.on_gnss_started(),
            LocationCallback::FirstFix { ttff_ms } => {
                if self.status_registered() {
                    self.shared.engine().on_first_fix(ttff_ms);
                    self.shared.emit(PositioningEvent::FirstFix { ttff_ms });
                }
            }
            LocationCallback::SatelliteStatus(status) => {
                if self.status_registered() {
                    self.shared
                        .emit(PositioningEvent::SatelliteStatusChanged(status));
                }
            }
            LocationCallback::Measurements(batch) => self.on_measurements(batch),
            LocationCallback::NavigationMessage(message) => {
                if self.shared.engine().registrations().navigation.is_some() {
                    self.shared
                        .emit(PositioningEvent::NavigationMessageReceived(message));
                }
            }
            LocationCallback::GnssStopped => {
                if self.status_registered() {
                    let dependents = self.shared.engine().on_stopped();
                    self.shared.release(dependents);
                    self.shared.emit(PositioningEvent::GnssStopped);
                }
            }
            LocationCallback::CapabilitiesChanged => {
                let hardware = self.shared.platform.gnss_hardware();
                self.shared
                    .emit(PositioningEvent::GnssCapabilitiesChanged(hardware));
            }
            LocationCallback::ModeChanged => {
                let enabled = self.shared.platform.is_location_enabled();
                self.shared
                    .emit(PositioningEvent::LocationModeChanged(enabled));
            }
            LocationCallback::ProviderChanged { provider, enabled } => {
                if provider.is_empty() {
                    return;
                }
                tracing::debug!(provider = %provider, enabled, "Provider changed");
                self.refresh_providers();
            }
        }
    }

    fn status_registered(&self) -> bool {
        self.shared.engine().registrations().status.is_some()
    }

    fn on_location(&mut self, location: Option<Location>) {
        let mut engine = self.shared.engine();
        if !engine.accepts_locations() {
            tracing::trace!("No active locating request, dropping fix");
            return;
        }
        // Single-shot requests tear down before anyone hears about the fix.
        if engine.is_single_shot() {
            let teardown = engine.finish();
            drop(engine);
            self.shared.release(teardown);
        } else {
            drop(engine);
        }
        self.shared.emit(PositioningEvent::LocationChanged(location));
    }

    fn on_gnss_started(&mut self) {
        if !self.status_registered() {
            return;
        }
        self.shared.engine().on_started();
        self.shared.emit(PositioningEvent::GnssStarted);
        self.register_dependents();
    }

    /// Measurement and navigation-message feeds, registered only once the
    /// engine session exists. Failures skip the feed and are logged.
    fn register_dependents(&mut self) {
        let platform = Arc::clone(&self.shared.platform);
        let mut engine = self.shared.engine();
        let id = engine.current_request();
        let sink = self.sink.map(move |callback| Work::Request(id, callback));

        if engine.needs_measurements() {
            let request = MeasurementRequest {
                full_tracking: self.shared.force_full_tracking.load(Ordering::Relaxed),
            };
            match platform.register_gnss_measurements(&request, sink.clone()) {
                Ok(handle) => engine.set_measurements(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping GNSS measurements registration");
                }
            }
        }

        if engine.needs_navigation() {
            match platform.register_navigation_messages(sink) {
                Ok(handle) => engine.set_navigation(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping navigation message registration");
                }
            }
        }
    }

    fn on_measurements(&mut self, batch: GnssMeasurementsEvent) {
        let edge = {
            let mut engine = self.shared.engine();
            if engine.registrations().measurements.is_none() {
                return;
            }
            engine.observe_full_tracking(batch.full_tracking())
        };
        if let Some(full_tracking) = edge {
            self.shared
                .emit(PositioningEvent::FullTrackingChanged(full_tracking));
        }
        self.shared
            .emit(PositioningEvent::MeasurementsReceived(batch));
    }

    /// Publish the enabled-provider set if its membership changed.
    fn refresh_providers(&mut self) {
        let providers = self.shared.platform.enabled_providers();
        let current: HashSet<String> = providers.iter().cloned().collect();
        if self.last_providers.as_ref() == Some(&current) {
            return;
        }
        self.last_providers = Some(current);
        self.shared
            .emit(PositioningEvent::ProvidersChanged(providers));
    }
}

/// Scoped registration of the provider/capability broadcast receiver.
///
/// Dropping it unregisters the receiver.
pub struct BroadcastSubscription<P: LocationPlatform> {
    platform: Arc<P>,
    handle: Option<ListenerHandle>,
}

impl<P: LocationPlatform> BroadcastSubscription<P> {
    #[must_use]
    pub fn handle(&self) -> Option<ListenerHandle> {
        self.handle
    }

    /// Unregister now instead of on drop.
    pub fn cancel(mut self) {
        self.unregister();
    }

    fn unregister(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.platform.unregister_broadcasts(handle);
            tracing::debug!(?handle, "Broadcast receiver unregistered");
        }
    }
}

impl<P: LocationPlatform> Drop for BroadcastSubscription<P> {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Observer for fixes, GNSS engine lifecycle and provider state.
pub struct PositioningObserver<P: LocationPlatform> {
    shared: Arc<Shared<P>>,
    queue: TaskQueue<Work>,
    permissions: Arc<dyn PermissionCheck>,
    options: Option<LocationOptions>,
    session: ObserverSession,
    broadcasts: Option<BroadcastSubscription<P>>,
}

impl<P: LocationPlatform> PositioningObserver<P> {
    /// Create an observer with no locating options set.
    ///
    /// Returns the observer and the receiver listeners read events from.
    /// Must be called from within a tokio runtime.
    pub fn new(
        platform: Arc<P>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> (Self, mpsc::UnboundedReceiver<PositioningEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            platform,
            engine: Mutex::new(EngineSession::new()),
            events,
            force_full_tracking: AtomicBool::new(false),
        });

        let handler_shared = Arc::clone(&shared);
        let queue = TaskQueue::spawn_with("positioning", move |sink: CallbackSink<Work>| {
            let mut handler = CallbackHandler {
                shared: handler_shared,
                sink,
                last_providers: None,
            };
            move |work| handler.handle(work)
        });

        (
            Self {
                shared,
                queue,
                permissions,
                options: None,
                session: ObserverSession::new("positioning"),
                broadcasts: None,
            },
            rx,
        )
    }

    /// Create an observer with options and full-tracking taken from config.
    pub fn with_config(
        platform: Arc<P>,
        permissions: Arc<dyn PermissionCheck>,
        config: &PositioningConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PositioningEvent>) {
        let (mut observer, rx) = Self::new(platform, permissions);
        observer.set_options(config.provider.clone(), config.mode, config.quality);
        observer.set_force_full_tracking(config.force_full_tracking);
        (observer, rx)
    }

    /// Set the options for the next `start_locating`. No validation here.
    pub fn set_options(&mut self, provider: impl Into<String>, mode: LocationMode, quality: Quality) {
        self.options = Some(LocationOptions::new(provider, mode, quality));
    }

    #[must_use]
    pub fn options(&self) -> Option<&LocationOptions> {
        self.options.as_ref()
    }

    /// Request full tracking on the next measurement registration.
    pub fn set_force_full_tracking(&self, enabled: bool) {
        self.shared
            .force_full_tracking
            .store(enabled, Ordering::Relaxed);
    }

    /// True if the provider is unknown to the platform or disabled.
    #[must_use]
    pub fn is_provider_unavailable(&self, provider: &str) -> bool {
        provider.is_empty()
            || !self.shared.platform.has_provider(provider)
            || !self.shared.platform.is_provider_enabled(provider)
    }

    #[must_use]
    pub fn gnss_phase(&self) -> GnssPhase {
        self.shared.engine().phase()
    }

    /// Whether a single/track request is registered or a last-known fix is
    /// still queued.
    #[must_use]
    pub fn is_locating(&self) -> bool {
        self.shared.engine().accepts_locations()
    }

    fn checked_options(&self) -> Result<LocationOptions, ObserverError> {
        let options = self.options.clone().ok_or(Precondition::OptionsNotSet)?;
        if options.provider.is_empty() {
            return Err(Precondition::EmptyProvider.into());
        }
        Ok(options)
    }

    /// Register the broadcast receiver and hand ownership to the caller.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` without location permission, or the
    /// platform error if the receiver cannot be registered.
    pub fn subscribe_broadcasts(&self) -> Result<BroadcastSubscription<P>, ObserverError> {
        require_any(self.permissions.as_ref(), &LOCATION_PERMISSIONS)?;
        let sink = self.queue.sink().map(Work::Callback);
        let handle = self
            .shared
            .platform
            .register_broadcasts(&BroadcastAction::ALL, sink)?;
        Ok(BroadcastSubscription {
            platform: Arc::clone(&self.shared.platform),
            handle: Some(handle),
        })
    }

    /// Start locating with the configured options.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if options are missing or invalid,
    /// `ResourceUnavailable` if the provider is unknown or disabled,
    /// `PermissionDenied` without location permission, or the platform
    /// error if the location request is refused.
    pub fn start_locating(&mut self) -> Result<(), ObserverError> {
        let options = self.checked_options()?;
        if self.is_provider_unavailable(&options.provider) {
            return Err(ObserverError::ResourceUnavailable(options.provider));
        }
        require_any(self.permissions.as_ref(), &LOCATION_PERMISSIONS)?;

        let platform = Arc::clone(&self.shared.platform);
        let mut engine = self.shared.engine();

        if matches!(engine.request(), ActiveRequest::Live(_)) {
            tracing::debug!("Replacing active locating request");
            let previous = engine.finish();
            self.shared.release(previous);
        }

        tracing::info!(
            provider = %options.provider,
            mode = %options.mode,
            quality = ?options.quality,
            "Start locating"
        );

        let id = engine.next_request();
        let Some(request) = LocationRequest::for_mode(options.mode, options.quality) else {
            // Last-known: republish through the same path as live fixes.
            let cached = platform.last_known_location(&options.provider);
            engine.begin_last();
            drop(engine);
            if !self
                .queue
                .push(Work::Request(id, LocationCallback::LocationChanged(cached)))
            {
                return Err(ObserverError::ChannelClosed);
            }
            return Ok(());
        };

        let sink = self
            .queue
            .sink()
            .map(move |callback| Work::Request(id, callback));
        let updates = platform.request_location_updates(&options.provider, &request, sink.clone())?;

        let status = match platform.register_gnss_status(sink) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "GNSS status unavailable, locating without it");
                None
            }
        };

        engine.begin_live(options, updates, status);
        Ok(())
    }

    /// Stop locating. A queued last-known fix is left to complete.
    pub fn stop_locating(&mut self) {
        let mut engine = self.shared.engine();
        if !matches!(engine.request(), ActiveRequest::Live(_)) {
            return;
        }
        let teardown = engine.finish();
        drop(engine);
        self.shared.release(teardown);
        tracing::info!("Stop locating");
    }

    /// Ask the GNSS engine to forget the given assistance data.
    ///
    /// # Errors
    ///
    /// Returns a precondition error unless options are set and name the gps
    /// provider, `ResourceUnavailable` if gps is disabled, or the platform
    /// error if the command is rejected.
    pub fn delete_aiding_data(&self, categories: &[AidingDataCategory]) -> Result<(), ObserverError> {
        let options = self.checked_options()?;
        if !options.is_gnss() {
            return Err(Precondition::ProviderNotGnss(options.provider).into());
        }
        if self.is_provider_unavailable(GPS_PROVIDER) {
            return Err(ObserverError::ResourceUnavailable(options.provider));
        }

        let extras = AidingDataCategory::to_extras(categories);
        tracing::info!(categories = ?extras.keys().collect::<Vec<_>>(), "Deleting aiding data");
        self.shared
            .platform
            .send_extra_command(GPS_PROVIDER, DELETE_AIDING_DATA_COMMAND, &extras)?;
        Ok(())
    }

    /// Wait until every callback queued so far has been handled.
    ///
    /// # Errors
    ///
    /// Returns `ObserverError::ChannelClosed` if the queue has shut down.
    pub async fn flush(&self) -> Result<(), ObserverError> {
        self.queue.flush().await
    }

    /// Stop everything and join the callback queue.
    pub async fn shutdown(mut self) {
        self.stop_locating();
        let _ = self.stop_observing();
        self.queue.shutdown().await;
    }
}

impl<P: LocationPlatform> ObservableSession for PositioningObserver<P> {
    fn start_observing(&mut self) -> Result<(), ObserverError> {
        require_any(self.permissions.as_ref(), &LOCATION_PERMISSIONS)?;
        if self.session.is_observing() {
            tracing::debug!("Positioning observer already observing");
            return Ok(());
        }

        self.broadcasts = Some(self.subscribe_broadcasts()?);
        self.session.begin();

        // Baseline so late listeners are not missing current state.
        self.queue
            .push(Work::Callback(LocationCallback::ModeChanged));
        self.queue.push(Work::RefreshProviders);
        self.queue
            .push(Work::Callback(LocationCallback::CapabilitiesChanged));
        Ok(())
    }

    fn stop_observing(&mut self) -> Result<(), ObserverError> {
        if self.session.end() {
            if let Some(subscription) = self.broadcasts.take() {
                subscription.cancel();
            }
        }
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.session.state()
    }
}
