//! Capability-set observers: snapshot publishing per view.

use std::sync::Arc;

use diag_observers::network::{
    AllNetworks, Capability, CellularView, NetworkCallback, NetworkCapabilities,
    NetworkCapabilitySetObserver, NetworkEvent, NetworkHandle, NetworkRequest, NetworkSnapshot,
    Transport, WifiInfo, WifiView,
};
use diag_observers::session::{
    AllowAll, ObservableSession, ObserverError, Permission, PermissionCheck,
};
use diag_observers::telephony::{SubscriptionId, SubscriptionInfo};

use super::fakes::{drain, FakeConnectivityPlatform};

fn cellular(subscription: i32) -> NetworkCapabilities {
    NetworkCapabilities {
        transports: [Transport::Cellular].into(),
        capabilities: [Capability::Internet, Capability::Validated].into(),
        subscription_id: Some(SubscriptionId(subscription)),
        downstream_kbps: 50_000,
        upstream_kbps: 10_000,
        ..NetworkCapabilities::default()
    }
}

fn wifi(ssid: &str) -> NetworkCapabilities {
    NetworkCapabilities {
        transports: [Transport::Wifi].into(),
        capabilities: [Capability::Internet, Capability::NotMetered].into(),
        wifi_info: Some(WifiInfo {
            ssid: Some(ssid.to_string()),
            rssi_dbm: -55,
            frequency_mhz: 5180,
            ..WifiInfo::default()
        }),
        ..NetworkCapabilities::default()
    }
}

fn resolver(subscription: SubscriptionId) -> Option<SubscriptionInfo> {
    (subscription.0 == 3).then(|| SubscriptionInfo::new(3, 0))
}

#[tokio::test]
async fn every_change_publishes_full_snapshot() {
    let platform = Arc::new(FakeConnectivityPlatform::new());
    let (mut obs, mut rx) = NetworkCapabilitySetObserver::new(
        Arc::clone(&platform),
        AllNetworks(NetworkRequest::cellular_internet()),
        Arc::new(AllowAll),
    );
    obs.start_observing().unwrap();
    assert_eq!(platform.requests(), vec![NetworkRequest::cellular_internet()]);

    let net = NetworkHandle(100);
    platform.deliver(NetworkCallback::CapabilitiesChanged(net, cellular(3)));
    platform.deliver(NetworkCallback::CapabilitiesChanged(net, cellular(3)));
    obs.flush().await.unwrap();

    let expected: NetworkSnapshot<NetworkCapabilities> = [(net, cellular(3))].into();
    assert_eq!(
        drain(&mut rx),
        vec![
            NetworkEvent::NetworksChanged(expected.clone()),
            NetworkEvent::NetworksChanged(expected.clone()),
        ]
    );
    assert_eq!(obs.snapshot(), expected);
}

#[tokio::test]
async fn lost_unknown_network_still_publishes() {
    let platform = Arc::new(FakeConnectivityPlatform::new());
    let (mut obs, mut rx) = NetworkCapabilitySetObserver::new(
        Arc::clone(&platform),
        AllNetworks(NetworkRequest::wifi_internet()),
        Arc::new(AllowAll),
    );
    obs.start_observing().unwrap();

    platform.deliver(NetworkCallback::Lost(NetworkHandle(42)));
    obs.flush().await.unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![NetworkEvent::NetworksChanged(NetworkSnapshot::new())]
    );
}

#[tokio::test]
async fn lost_and_unavailable_shrink_the_snapshot() {
    let platform = Arc::new(FakeConnectivityPlatform::new());
    let (mut obs, mut rx) = NetworkCapabilitySetObserver::new(
        Arc::clone(&platform),
        WifiView,
        Arc::new(AllowAll),
    );
    obs.start_observing().unwrap();

    platform.deliver(NetworkCallback::CapabilitiesChanged(NetworkHandle(1), wifi("home")));
    platform.deliver(NetworkCallback::CapabilitiesChanged(NetworkHandle(2), wifi("office")));
    platform.deliver(NetworkCallback::Lost(NetworkHandle(1)));
    obs.flush().await.unwrap();
    assert_eq!(obs.snapshot().len(), 1);
    assert_eq!(
        obs.snapshot()[&NetworkHandle(2)]
            .as_ref()
            .and_then(|info| info.ssid.as_deref()),
        Some("office")
    );

    platform.deliver(NetworkCallback::Unavailable);
    obs.flush().await.unwrap();
    let sizes: Vec<usize> = drain(&mut rx)
        .into_iter()
        .map(|NetworkEvent::NetworksChanged(snapshot)| snapshot.len())
        .collect();
    assert_eq!(sizes, vec![1, 2, 1, 0]);
}

#[tokio::test]
async fn cellular_view_resolves_subscriptions() {
    let platform = Arc::new(FakeConnectivityPlatform::new());
    let (mut obs, mut rx) = NetworkCapabilitySetObserver::new(
        Arc::clone(&platform),
        CellularView::new(resolver),
        Arc::new(AllowAll),
    );
    obs.start_observing().unwrap();

    platform.deliver(NetworkCallback::CapabilitiesChanged(NetworkHandle(1), cellular(3)));
    platform.deliver(NetworkCallback::CapabilitiesChanged(NetworkHandle(2), cellular(8)));
    obs.flush().await.unwrap();

    let last = drain(&mut rx).pop().unwrap();
    let NetworkEvent::NetworksChanged(snapshot) = last;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[&NetworkHandle(1)].id, SubscriptionId(3));
}

#[tokio::test]
async fn cellular_view_needs_phone_state() {
    let platform = Arc::new(FakeConnectivityPlatform::new());
    let network_only: Arc<dyn PermissionCheck> =
        Arc::new(|p: Permission| p == Permission::NetworkState);
    let (mut obs, _rx) = NetworkCapabilitySetObserver::new(
        Arc::clone(&platform),
        CellularView::new(resolver),
        network_only,
    );

    let err = obs.start_observing().unwrap_err();
    assert!(matches!(
        err,
        ObserverError::PermissionDenied(Permission::ReadPhoneState)
    ));
    assert_eq!(platform.registration_count(), 0);
}

#[tokio::test]
async fn stop_clears_without_publishing() {
    let platform = Arc::new(FakeConnectivityPlatform::new());
    let (mut obs, mut rx) = NetworkCapabilitySetObserver::new(
        Arc::clone(&platform),
        WifiView,
        Arc::new(AllowAll),
    );
    let mut watch = obs.watch();
    obs.start_observing().unwrap();
    obs.start_observing().unwrap();
    assert_eq!(platform.registration_count(), 1);

    platform.deliver(NetworkCallback::CapabilitiesChanged(NetworkHandle(1), wifi("home")));
    obs.flush().await.unwrap();
    assert!(watch.has_changed().unwrap());
    assert_eq!(watch.borrow_and_update().len(), 1);
    drain(&mut rx);

    obs.stop_observing().unwrap();
    obs.flush().await.unwrap();

    assert_eq!(platform.registration_count(), 0);
    assert!(obs.snapshot().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn active_network_comes_from_platform() {
    let platform = Arc::new(FakeConnectivityPlatform::new());
    platform.set_active(Some(NetworkHandle(7)));
    let (obs, _rx) = NetworkCapabilitySetObserver::new(
        Arc::clone(&platform),
        AllNetworks(NetworkRequest::cellular_internet()),
        Arc::new(AllowAll),
    );
    assert_eq!(obs.active_network(), Some(NetworkHandle(7)));
    obs.shutdown().await;
}
