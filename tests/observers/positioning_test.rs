//! Positioning observer against a recording location stack.

use std::sync::Arc;

use tokio::sync::mpsc;

use diag_observers::positioning::{
    AidingDataCategory, GnssCapabilities, GnssHardware, GnssMeasurementsEvent, GnssPhase,
    GnssStatus, Location, LocationCallback, LocationMode, NavigationMessage, PositioningEvent,
    PositioningObserver, Quality, SatelliteInfo, DELETE_AIDING_DATA_COMMAND,
};
use diag_observers::session::{
    recv_within, AllowAll, ObservableSession, ObserverError, Permission, PermissionCheck,
    Precondition, SessionState,
};

use super::fakes::{drain, FakeLocationPlatform, Feed, WAIT};

type Observer = PositioningObserver<FakeLocationPlatform>;

fn observer(platform: &Arc<FakeLocationPlatform>) -> (Observer, mpsc::UnboundedReceiver<PositioningEvent>) {
    PositioningObserver::new(Arc::clone(platform), Arc::new(AllowAll))
}

fn fix(latitude: f64) -> Location {
    Location {
        provider: "gps".to_string(),
        latitude,
        longitude: 13.4,
        ..Location::default()
    }
}

fn status_with_fix() -> GnssStatus {
    GnssStatus {
        satellites: vec![SatelliteInfo {
            svid: 7,
            cn0_dbhz: 38.5,
            used_in_fix: true,
            ..SatelliteInfo::default()
        }],
    }
}

fn batch(full_tracking: bool) -> GnssMeasurementsEvent {
    GnssMeasurementsEvent {
        measurements: Vec::new(),
        is_full_tracking: Some(full_tracking),
    }
}

/// Track on gps with the engine session already started.
async fn started_track(platform: &Arc<FakeLocationPlatform>) -> (Observer, mpsc::UnboundedReceiver<PositioningEvent>) {
    let (mut obs, mut rx) = observer(platform);
    obs.set_options("gps", LocationMode::Track, Quality::High);
    obs.start_locating().unwrap();
    platform.deliver(Feed::Status, LocationCallback::GnssStarted);
    obs.flush().await.unwrap();
    assert_eq!(drain(&mut rx), vec![PositioningEvent::GnssStarted]);
    (obs, rx)
}

#[tokio::test]
async fn track_reports_engine_lifecycle_in_order() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, mut rx) = observer(&platform);
    obs.set_options("gps", LocationMode::Track, Quality::High);
    obs.start_locating().unwrap();

    assert_eq!(platform.count(Feed::Updates), 1);
    assert_eq!(platform.count(Feed::Status), 1);
    assert_eq!(platform.requests()[0].max_updates, u32::MAX);

    platform.deliver(Feed::Status, LocationCallback::GnssStarted);
    platform.deliver(Feed::Status, LocationCallback::FirstFix { ttff_ms: 4200 });
    platform.deliver(Feed::Status, LocationCallback::SatelliteStatus(status_with_fix()));
    platform.deliver(Feed::Updates, LocationCallback::LocationChanged(Some(fix(52.5))));
    obs.flush().await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], PositioningEvent::GnssStarted);
    assert_eq!(events[1], PositioningEvent::FirstFix { ttff_ms: 4200 });
    match &events[2] {
        PositioningEvent::SatelliteStatusChanged(status) => {
            assert!(status.any_used_in_fix());
        }
        other => panic!("Expected satellite status, got {other:?}"),
    }
    assert_eq!(events[3], PositioningEvent::LocationChanged(Some(fix(52.5))));
    assert_eq!(obs.gnss_phase(), GnssPhase::Tracking { ttff_ms: 4200 });
}

#[tokio::test]
async fn dependent_feeds_wait_for_engine_start() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, _rx) = observer(&platform);
    obs.set_options("gps", LocationMode::Track, Quality::Balanced);
    obs.start_locating().unwrap();
    obs.flush().await.unwrap();

    assert_eq!(platform.count(Feed::Measurements), 0);
    assert_eq!(platform.count(Feed::Navigation), 0);

    platform.deliver(Feed::Status, LocationCallback::GnssStarted);
    obs.flush().await.unwrap();

    assert_eq!(platform.count(Feed::Measurements), 1);
    assert_eq!(platform.count(Feed::Navigation), 1);
    let calls = platform.calls();
    let status_at = calls.iter().position(|c| c == "register_status").unwrap();
    let measurements_at = calls.iter().position(|c| c == "register_measurements").unwrap();
    assert!(status_at < measurements_at);
}

#[tokio::test]
async fn stop_locating_tears_down_dependents_first() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, _rx) = started_track(&platform).await;

    obs.stop_locating();

    assert_eq!(
        platform.teardown_calls(),
        vec![
            "remove_updates",
            "unregister_navigation",
            "unregister_measurements",
            "unregister_status"
        ]
    );
    assert!(!obs.is_locating());
    for feed in [Feed::Updates, Feed::Status, Feed::Measurements, Feed::Navigation] {
        assert_eq!(platform.count(feed), 0, "{feed:?} still registered");
    }
}

#[tokio::test]
async fn stop_locating_closes_engine_session() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, mut rx) = started_track(&platform).await;
    let old_status = platform.sink_of(Feed::Status).unwrap();
    platform.deliver(Feed::Status, LocationCallback::FirstFix { ttff_ms: 900 });
    obs.flush().await.unwrap();
    assert_eq!(drain(&mut rx), vec![PositioningEvent::FirstFix { ttff_ms: 900 }]);

    obs.stop_locating();
    obs.flush().await.unwrap();
    assert_eq!(drain(&mut rx), vec![PositioningEvent::GnssStopped]);
    assert_eq!(obs.gnss_phase(), GnssPhase::Stopped);

    // The engine's own stop arrives after the listener is gone.
    old_status.deliver(LocationCallback::GnssStopped);
    obs.flush().await.unwrap();
    assert!(drain(&mut rx).is_empty());

    // The next request waits for a fresh engine start.
    obs.start_locating().unwrap();
    obs.flush().await.unwrap();
    assert_eq!(platform.count(Feed::Measurements), 0);
    assert_eq!(platform.count(Feed::Navigation), 0);
}

#[tokio::test]
async fn track_on_network_reports_engine_lifecycle() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, mut rx) = observer(&platform);
    obs.set_options("network", LocationMode::Track, Quality::High);
    obs.start_locating().unwrap();
    assert_eq!(platform.count(Feed::Status), 1);

    platform.deliver(Feed::Status, LocationCallback::GnssStarted);
    obs.flush().await.unwrap();
    assert_eq!(drain(&mut rx), vec![PositioningEvent::GnssStarted]);

    obs.stop_locating();
    assert_eq!(platform.count(Feed::Status), 0);
    assert_eq!(
        platform.teardown_calls(),
        vec![
            "remove_updates",
            "unregister_navigation",
            "unregister_measurements",
            "unregister_status"
        ]
    );
}

#[tokio::test]
async fn engine_stop_drops_dependent_feeds_only() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (obs, mut rx) = started_track(&platform).await;
    let stale_measurements = platform.sink_of(Feed::Measurements).unwrap();

    platform.deliver(Feed::Status, LocationCallback::GnssStopped);
    obs.flush().await.unwrap();

    assert_eq!(drain(&mut rx), vec![PositioningEvent::GnssStopped]);
    assert_eq!(obs.gnss_phase(), GnssPhase::Stopped);
    assert_eq!(platform.count(Feed::Measurements), 0);
    assert_eq!(platform.count(Feed::Navigation), 0);
    assert_eq!(platform.count(Feed::Status), 1);
    assert_eq!(platform.count(Feed::Updates), 1);

    // A late batch from the dropped registration is ignored.
    stale_measurements.deliver(LocationCallback::Measurements(batch(true)));
    obs.flush().await.unwrap();
    assert!(drain(&mut rx).is_empty());

    // The next engine session registers them again.
    platform.deliver(Feed::Status, LocationCallback::GnssStarted);
    obs.flush().await.unwrap();
    assert_eq!(platform.count(Feed::Measurements), 1);
}

#[tokio::test]
async fn measurement_failure_is_skipped() {
    let platform = Arc::new(FakeLocationPlatform::new());
    platform.fail_measurements();
    let (mut obs, mut rx) = observer(&platform);
    obs.set_options("gps", LocationMode::Track, Quality::High);
    obs.start_locating().unwrap();

    platform.deliver(Feed::Status, LocationCallback::GnssStarted);
    platform.deliver(Feed::Status, LocationCallback::FirstFix { ttff_ms: 900 });
    obs.flush().await.unwrap();

    assert_eq!(platform.count(Feed::Measurements), 0);
    assert_eq!(platform.count(Feed::Navigation), 1);
    assert_eq!(
        drain(&mut rx),
        vec![
            PositioningEvent::GnssStarted,
            PositioningEvent::FirstFix { ttff_ms: 900 }
        ]
    );
}

#[tokio::test]
async fn full_tracking_changes_are_edges() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (obs, mut rx) = started_track(&platform).await;

    for full in [true, false, false, true] {
        platform.deliver(Feed::Measurements, LocationCallback::Measurements(batch(full)));
    }
    obs.flush().await.unwrap();

    let edges: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            PositioningEvent::FullTrackingChanged(full) => Some(full),
            _ => None,
        })
        .collect();
    assert_eq!(edges, vec![false, true]);
}

#[tokio::test]
async fn forced_full_tracking_reaches_measurement_request() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, _rx) = observer(&platform);
    obs.set_force_full_tracking(true);
    obs.set_options("gps", LocationMode::Track, Quality::High);
    obs.start_locating().unwrap();
    platform.deliver(Feed::Status, LocationCallback::GnssStarted);
    obs.flush().await.unwrap();

    let requests = platform.measurement_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].full_tracking);
}

#[tokio::test]
async fn navigation_messages_are_forwarded() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (obs, mut rx) = started_track(&platform).await;
    let message = NavigationMessage {
        svid: 3,
        message_type: 0x0101,
        submessage_id: 1,
        data: vec![1, 2, 3],
    };

    platform.deliver(Feed::Navigation, LocationCallback::NavigationMessage(message.clone()));
    obs.flush().await.unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![PositioningEvent::NavigationMessageReceived(message)]
    );
}

#[tokio::test]
async fn single_emits_exactly_one_fix() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, mut rx) = observer(&platform);
    obs.set_options("network", LocationMode::Single, Quality::Balanced);
    obs.start_locating().unwrap();
    assert_eq!(platform.requests()[0].max_updates, 1);
    assert_eq!(platform.count(Feed::Status), 1);

    let updates = platform.sink_of(Feed::Updates).unwrap();
    updates.deliver(LocationCallback::LocationChanged(Some(fix(1.0))));
    updates.deliver(LocationCallback::LocationChanged(Some(fix(2.0))));
    obs.flush().await.unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![PositioningEvent::LocationChanged(Some(fix(1.0)))]
    );
    assert_eq!(platform.count(Feed::Updates), 0);
    assert_eq!(platform.count(Feed::Status), 0);
    assert!(!obs.is_locating());
}

#[tokio::test]
async fn single_closes_a_started_engine_before_the_fix() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, mut rx) = observer(&platform);
    obs.set_options("gps", LocationMode::Single, Quality::High);
    obs.start_locating().unwrap();

    platform.deliver(Feed::Status, LocationCallback::GnssStarted);
    platform.deliver(Feed::Updates, LocationCallback::LocationChanged(Some(fix(3.0))));
    obs.flush().await.unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            PositioningEvent::GnssStarted,
            PositioningEvent::GnssStopped,
            PositioningEvent::LocationChanged(Some(fix(3.0))),
        ]
    );
    assert_eq!(obs.gnss_phase(), GnssPhase::Stopped);
}

#[tokio::test]
async fn last_without_cache_emits_none_once() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, mut rx) = observer(&platform);
    obs.set_options("network", LocationMode::Last, Quality::Balanced);
    obs.start_locating().unwrap();

    let event = recv_within(&mut rx, WAIT).await.unwrap();
    assert_eq!(event, PositioningEvent::LocationChanged(None));
    obs.flush().await.unwrap();
    assert!(drain(&mut rx).is_empty());
    assert!(platform.requests().is_empty());
    assert!(!obs.is_locating());
}

#[tokio::test]
async fn last_republishes_cached_fix() {
    let platform = Arc::new(FakeLocationPlatform::new());
    platform.set_last_known(Some(fix(48.1)));
    let (mut obs, mut rx) = observer(&platform);
    obs.set_options("gps", LocationMode::Last, Quality::Balanced);
    obs.start_locating().unwrap();
    obs.flush().await.unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![PositioningEvent::LocationChanged(Some(fix(48.1)))]
    );
}

#[tokio::test]
async fn restart_replaces_live_request() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, _rx) = observer(&platform);
    obs.set_options("gps", LocationMode::Track, Quality::High);
    obs.start_locating().unwrap();
    obs.set_options("network", LocationMode::Track, Quality::LowPower);
    obs.start_locating().unwrap();

    assert_eq!(platform.count(Feed::Updates), 1);
    assert_eq!(platform.count(Feed::Status), 1);
    assert_eq!(platform.teardown_calls(), vec!["remove_updates", "unregister_status"]);
}

#[tokio::test]
async fn replaced_request_callbacks_are_ignored() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, mut rx) = observer(&platform);
    obs.set_options("network", LocationMode::Single, Quality::Balanced);
    obs.start_locating().unwrap();
    let old_updates = platform.sink_of(Feed::Updates).unwrap();

    obs.set_options("gps", LocationMode::Track, Quality::High);
    obs.start_locating().unwrap();

    // A fix still in flight from the single request must not end the track.
    old_updates.deliver(LocationCallback::LocationChanged(Some(fix(1.0))));
    obs.flush().await.unwrap();
    assert!(drain(&mut rx).is_empty());
    assert!(obs.is_locating());
    assert_eq!(platform.count(Feed::Updates), 1);

    platform.deliver(Feed::Updates, LocationCallback::LocationChanged(Some(fix(2.0))));
    obs.flush().await.unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![PositioningEvent::LocationChanged(Some(fix(2.0)))]
    );
}

#[tokio::test]
async fn start_locating_checks_preconditions() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, _rx) = observer(&platform);

    let err = obs.start_locating().unwrap_err();
    assert!(matches!(
        err,
        ObserverError::Precondition(Precondition::OptionsNotSet)
    ));

    obs.set_options("", LocationMode::Track, Quality::High);
    let err = obs.start_locating().unwrap_err();
    assert!(matches!(
        err,
        ObserverError::Precondition(Precondition::EmptyProvider)
    ));

    obs.set_options("bogus", LocationMode::Track, Quality::High);
    let err = obs.start_locating().unwrap_err();
    assert!(matches!(err, ObserverError::ResourceUnavailable(p) if p == "bogus"));

    platform.set_provider("gps", false);
    obs.set_options("gps", LocationMode::Track, Quality::High);
    assert!(obs.is_provider_unavailable("gps"));
    let err = obs.start_locating().unwrap_err();
    assert!(matches!(err, ObserverError::ResourceUnavailable(_)));
    assert!(platform.requests().is_empty());
}

#[tokio::test]
async fn coarse_location_is_enough_to_locate() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let coarse_only: Arc<dyn PermissionCheck> =
        Arc::new(|p: Permission| p == Permission::CoarseLocation);
    let (mut obs, _rx) = PositioningObserver::new(Arc::clone(&platform), coarse_only);
    obs.set_options("network", LocationMode::Track, Quality::Balanced);
    obs.start_locating().unwrap();
    assert_eq!(platform.count(Feed::Updates), 1);

    let denied: Arc<dyn PermissionCheck> = Arc::new(|_: Permission| false);
    let (mut obs, _rx) = PositioningObserver::new(Arc::clone(&platform), denied);
    obs.set_options("network", LocationMode::Track, Quality::Balanced);
    let err = obs.start_locating().unwrap_err();
    assert!(matches!(err, ObserverError::PermissionDenied(_)));
    assert!(err.is_precondition());
}

#[tokio::test]
async fn delete_aiding_data_only_for_gps() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, _rx) = observer(&platform);

    obs.set_options("network", LocationMode::Track, Quality::Balanced);
    let err = obs
        .delete_aiding_data(&AidingDataCategory::PRESET_WARM)
        .unwrap_err();
    assert!(matches!(
        err,
        ObserverError::Precondition(Precondition::ProviderNotGnss(ref p)) if p == "network"
    ));
    assert!(platform.commands().is_empty());

    obs.set_options("gps", LocationMode::Track, Quality::Balanced);
    obs.delete_aiding_data(&AidingDataCategory::PRESET_WARM)
        .unwrap();
    let commands = platform.commands();
    assert_eq!(commands.len(), 1);
    let (provider, command, extras) = &commands[0];
    assert_eq!(provider, "gps");
    assert_eq!(command, DELETE_AIDING_DATA_COMMAND);
    assert_eq!(extras.keys().collect::<Vec<_>>(), vec!["ephemeris", "utc"]);
    assert!(extras.values().all(|v| *v));
}

#[tokio::test]
async fn observing_publishes_baseline_then_diffs() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let hardware = GnssHardware {
        capabilities: GnssCapabilities {
            measurements: true,
            navigation_messages: true,
            ..GnssCapabilities::default()
        },
        model_name: Some("test-gnss".to_string()),
        year_of_hardware: 2023,
    };
    platform.set_hardware(hardware.clone());
    let (mut obs, mut rx) = observer(&platform);

    obs.start_observing().unwrap();
    assert_eq!(obs.state(), SessionState::Observing);
    assert_eq!(platform.count(Feed::Broadcasts), 1);
    obs.flush().await.unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![
            PositioningEvent::LocationModeChanged(true),
            PositioningEvent::ProvidersChanged(vec!["gps".to_string(), "network".to_string()]),
            PositioningEvent::GnssCapabilitiesChanged(hardware),
        ]
    );

    // Same membership: nothing to report.
    platform.deliver(
        Feed::Broadcasts,
        LocationCallback::ProviderChanged {
            provider: "gps".to_string(),
            enabled: true,
        },
    );
    obs.flush().await.unwrap();
    assert!(drain(&mut rx).is_empty());

    platform.set_provider("network", false);
    platform.deliver(
        Feed::Broadcasts,
        LocationCallback::ProviderChanged {
            provider: "network".to_string(),
            enabled: false,
        },
    );
    obs.flush().await.unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![PositioningEvent::ProvidersChanged(vec!["gps".to_string()])]
    );

    obs.stop_observing().unwrap();
    assert_eq!(obs.state(), SessionState::Idle);
    assert_eq!(platform.count(Feed::Broadcasts), 0);
}

#[tokio::test]
async fn start_observing_is_idempotent() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (mut obs, _rx) = observer(&platform);
    obs.start_observing().unwrap();
    obs.start_observing().unwrap();
    assert_eq!(platform.count(Feed::Broadcasts), 1);
    obs.shutdown().await;
    assert_eq!(platform.count(Feed::Broadcasts), 0);
}

#[tokio::test]
async fn broadcast_subscription_unregisters_on_drop() {
    let platform = Arc::new(FakeLocationPlatform::new());
    let (obs, _rx) = observer(&platform);
    {
        let subscription = obs.subscribe_broadcasts().unwrap();
        assert!(subscription.handle().is_some());
        assert_eq!(platform.count(Feed::Broadcasts), 1);
    }
    assert_eq!(platform.count(Feed::Broadcasts), 0);
}
