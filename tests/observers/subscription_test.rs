//! Subscription observer slot tracking.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_test::assert_ok;

use diag_observers::session::{
    AllowAll, ObservableSession, ObserverError, Permission, PermissionCheck,
};
use diag_observers::telephony::{
    CellInfo, CellTechnology, DataActivity, RegistrationState, ServiceState, SubscriptionCallback,
    SubscriptionId, SubscriptionInfo, SubscriptionObserver, TelephonyEvent,
};

use super::fakes::{drain, FakeTelephonyPlatform};

type Observer = SubscriptionObserver<FakeTelephonyPlatform>;

fn observer(platform: &Arc<FakeTelephonyPlatform>) -> (Observer, mpsc::UnboundedReceiver<TelephonyEvent>) {
    SubscriptionObserver::new(Arc::clone(platform), Arc::new(AllowAll))
}

fn sub(id: i32, slot: usize) -> SubscriptionInfo {
    SubscriptionInfo {
        carrier_name: format!("carrier-{id}"),
        ..SubscriptionInfo::new(id, slot)
    }
}

fn changed(slot: usize, info: Option<SubscriptionInfo>) -> TelephonyEvent {
    TelephonyEvent::SubscriptionChanged { slot, info }
}

#[tokio::test]
async fn only_changed_slots_are_reported() {
    let platform = Arc::new(FakeTelephonyPlatform::new(2));
    platform.set_slot(1, Some(sub(5, 1)));
    let (mut obs, mut rx) = observer(&platform);

    assert_ok!(obs.start_observing());
    obs.flush().await.unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![
            changed(1, Some(sub(5, 1))),
            TelephonyEvent::SubscriptionsChanged(BTreeMap::from([(1, sub(5, 1))])),
        ]
    );

    platform.set_slot(0, Some(sub(3, 0)));
    platform.notify();
    obs.flush().await.unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![
            changed(0, Some(sub(3, 0))),
            TelephonyEvent::SubscriptionsChanged(BTreeMap::from([(0, sub(3, 0)), (1, sub(5, 1))])),
        ]
    );
    assert_eq!(platform.bundle_count(), 2);
    assert_eq!(platform.registered(), vec![SubscriptionId(5), SubscriptionId(3)]);
}

#[tokio::test]
async fn unchanged_notification_is_silent() {
    let platform = Arc::new(FakeTelephonyPlatform::new(2));
    platform.set_slot(0, Some(sub(3, 0)));
    let (mut obs, mut rx) = observer(&platform);
    obs.start_observing().unwrap();
    obs.flush().await.unwrap();
    drain(&mut rx);

    platform.notify();
    platform.notify();
    obs.flush().await.unwrap();
    assert!(drain(&mut rx).is_empty());
    assert_eq!(platform.registered().len(), 1);
}

#[tokio::test]
async fn swapped_subscription_replaces_bundle() {
    let platform = Arc::new(FakeTelephonyPlatform::new(1));
    platform.set_slot(0, Some(sub(3, 0)));
    let (mut obs, mut rx) = observer(&platform);
    obs.start_observing().unwrap();
    obs.flush().await.unwrap();
    let old_bundle = platform.bundle_sink(SubscriptionId(3)).unwrap();
    drain(&mut rx);

    platform.set_slot(0, Some(sub(7, 0)));
    platform.notify();
    obs.flush().await.unwrap();

    assert_eq!(platform.unregistered(), vec![SubscriptionId(3)]);
    assert_eq!(platform.bundle_count(), 1);
    assert_eq!(
        drain(&mut rx),
        vec![
            changed(0, Some(sub(7, 0))),
            TelephonyEvent::SubscriptionsChanged(BTreeMap::from([(0, sub(7, 0))])),
        ]
    );

    // Callbacks from the replaced bundle no longer count.
    old_bundle.deliver(SubscriptionCallback::DataActivity(DataActivity::In));
    let new_bundle = platform.bundle_sink(SubscriptionId(7)).unwrap();
    new_bundle.deliver(SubscriptionCallback::DataActivity(DataActivity::Out));
    obs.flush().await.unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![TelephonyEvent::DataActivity {
            subscription: sub(7, 0),
            activity: DataActivity::Out,
        }]
    );
}

#[tokio::test]
async fn removed_subscription_clears_slot() {
    let platform = Arc::new(FakeTelephonyPlatform::new(2));
    platform.set_slot(0, Some(sub(3, 0)));
    platform.set_slot(1, Some(sub(5, 1)));
    let (mut obs, mut rx) = observer(&platform);
    obs.start_observing().unwrap();
    obs.flush().await.unwrap();
    drain(&mut rx);

    platform.set_slot(1, None);
    platform.notify();
    obs.flush().await.unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            changed(1, None),
            TelephonyEvent::SubscriptionsChanged(BTreeMap::from([(0, sub(3, 0))])),
        ]
    );
    assert_eq!(platform.unregistered(), vec![SubscriptionId(5)]);
}

#[tokio::test]
async fn refused_bundle_leaves_slot_empty() {
    let platform = Arc::new(FakeTelephonyPlatform::new(1));
    platform.refuse(SubscriptionId(9));
    platform.set_slot(0, Some(sub(9, 0)));
    let (mut obs, mut rx) = observer(&platform);
    obs.start_observing().unwrap();
    obs.flush().await.unwrap();

    assert!(drain(&mut rx).is_empty());
    assert_eq!(platform.bundle_count(), 0);
}

#[tokio::test]
async fn service_state_triggers_cell_refresh() {
    let platform = Arc::new(FakeTelephonyPlatform::new(1));
    let cell = CellInfo {
        technology: CellTechnology::Lte,
        registered: true,
        physical_cell_id: Some(101),
        ..CellInfo::default()
    };
    platform.set_cells(vec![cell.clone()]);
    platform.set_slot(0, Some(sub(3, 0)));
    let (mut obs, mut rx) = observer(&platform);
    obs.start_observing().unwrap();
    obs.flush().await.unwrap();
    drain(&mut rx);

    let state = ServiceState {
        state: RegistrationState::InService,
        roaming: false,
        operator_name: Some("Test".to_string()),
    };
    platform
        .bundle_sink(SubscriptionId(3))
        .unwrap()
        .deliver(SubscriptionCallback::ServiceStateChanged(state.clone()));
    obs.flush().await.unwrap();
    // The refresh answer was queued behind the service-state callback.
    obs.flush().await.unwrap();

    assert_eq!(platform.cell_requests(), vec![SubscriptionId(3)]);
    assert_eq!(
        drain(&mut rx),
        vec![
            TelephonyEvent::ServiceStateChanged {
                subscription: sub(3, 0),
                state,
            },
            TelephonyEvent::CellInfoChanged {
                subscription: sub(3, 0),
                cells: vec![cell],
            },
        ]
    );
}

#[tokio::test]
async fn stop_unregisters_everything() {
    let platform = Arc::new(FakeTelephonyPlatform::new(2));
    platform.set_slot(0, Some(sub(3, 0)));
    platform.set_slot(1, Some(sub(5, 1)));
    let (mut obs, mut rx) = observer(&platform);
    obs.start_observing().unwrap();
    obs.flush().await.unwrap();
    assert_eq!(platform.listener_count(), 1);
    drain(&mut rx);

    obs.stop_observing().unwrap();
    obs.flush().await.unwrap();

    assert_eq!(platform.listener_count(), 0);
    assert_eq!(platform.bundle_count(), 0);
    assert!(drain(&mut rx).is_empty());

    // A restart sees both slots as new again.
    obs.start_observing().unwrap();
    obs.flush().await.unwrap();
    assert_eq!(drain(&mut rx).len(), 3);
}

#[tokio::test]
async fn start_requires_phone_state() {
    let platform = Arc::new(FakeTelephonyPlatform::new(1));
    let location_only: Arc<dyn PermissionCheck> =
        Arc::new(|p: Permission| p == Permission::FineLocation);
    let (mut obs, _rx) = SubscriptionObserver::new(Arc::clone(&platform), location_only);

    let err = obs.start_observing().unwrap_err();
    assert!(matches!(
        err,
        ObserverError::PermissionDenied(Permission::ReadPhoneState)
    ));
    assert_eq!(platform.listener_count(), 0);
}

#[tokio::test]
async fn roaming_and_default_subscription() {
    let platform = Arc::new(FakeTelephonyPlatform::new(1));
    platform.set_default_subscription(Some(SubscriptionId(3)));
    platform.set_service_state(
        SubscriptionId(3),
        ServiceState {
            state: RegistrationState::InService,
            roaming: true,
            operator_name: None,
        },
    );
    let (obs, _rx) = observer(&platform);

    assert_eq!(obs.default_subscription_id(), Some(SubscriptionId(3)));
    assert!(obs.is_roaming(SubscriptionId(3)).unwrap());
    assert!(!obs.is_roaming(SubscriptionId(4)).unwrap());
}
