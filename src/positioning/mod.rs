//! Positioning: locating modes, GNSS engine lifecycle and provider state.

mod engine;
mod gnss;
mod observer;
mod platform;
mod types;

pub use engine::{ActiveRequest, EngineSession, GnssPhase, Registrations, RequestId, Teardown};
pub use gnss::{
    Constellation, GnssCapabilities, GnssHardware, GnssMeasurement, GnssMeasurementsEvent,
    GnssStatus, MultipathIndicator, NavigationMessage, SatelliteInfo,
};
pub use observer::{BroadcastSubscription, PositioningEvent, PositioningObserver};
pub use platform::{BroadcastAction, LocationCallback, LocationPlatform, MeasurementRequest};
pub use types::{
    AidingDataCategory, Location, LocationMode, LocationOptions, LocationRequest, Quality,
    DELETE_AIDING_DATA_COMMAND, FUSED_PROVIDER, GPS_PROVIDER, NETWORK_PROVIDER, PASSIVE_PROVIDER,
};
