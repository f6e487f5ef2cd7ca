//! Projections of the active-network map for each observer flavour.

use std::fmt::Debug;

use crate::session::Permission;
use crate::telephony::{SubscriptionId, SubscriptionInfo};

use super::types::{NetworkCapabilities, NetworkHandle, NetworkRequest, Transport, WifiInfo};

/// Decides what a capability-set observer listens for and what each
/// network in its published snapshot looks like.
pub trait NetworkView: Send + Sync + 'static {
    type Entry: Clone + Debug + PartialEq + Send + Sync + 'static;

    fn request(&self) -> NetworkRequest;

    /// Permissions needed on top of network state.
    fn extra_permissions(&self) -> &'static [Permission] {
        &[]
    }

    /// Project one network, or drop it from the snapshot.
    fn project(&self, network: NetworkHandle, caps: &NetworkCapabilities) -> Option<Self::Entry>;
}

/// Every network matching the request, with full capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllNetworks(pub NetworkRequest);

impl NetworkView for AllNetworks {
    type Entry = NetworkCapabilities;

    fn request(&self) -> NetworkRequest {
        self.0
    }

    fn project(&self, _network: NetworkHandle, caps: &NetworkCapabilities) -> Option<Self::Entry> {
        Some(caps.clone())
    }
}

/// Looks up the active subscription owning a cellular network.
pub trait SubscriptionResolver: Send + Sync + 'static {
    fn active_subscription_info(&self, subscription: SubscriptionId) -> Option<SubscriptionInfo>;
}

impl<F> SubscriptionResolver for F
where
    F: Fn(SubscriptionId) -> Option<SubscriptionInfo> + Send + Sync + 'static,
{
    fn active_subscription_info(&self, subscription: SubscriptionId) -> Option<SubscriptionInfo> {
        self(subscription)
    }
}

/// Cellular data networks, each resolved to its subscription. Networks
/// without a resolvable owner are left out.
pub struct CellularView<R> {
    resolver: R,
}

impl<R: SubscriptionResolver> CellularView<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }
}

impl<R: SubscriptionResolver> NetworkView for CellularView<R> {
    type Entry = SubscriptionInfo;

    fn request(&self) -> NetworkRequest {
        NetworkRequest::cellular_internet()
    }

    fn extra_permissions(&self) -> &'static [Permission] {
        &[Permission::ReadPhoneState]
    }

    fn project(&self, network: NetworkHandle, caps: &NetworkCapabilities) -> Option<Self::Entry> {
        if !caps.has_transport(Transport::Cellular) {
            return None;
        }
        let resolved = caps
            .subscription_id
            .and_then(|id| self.resolver.active_subscription_info(id));
        if resolved.is_none() {
            tracing::trace!(%network, subscription = ?caps.subscription_id, "Unresolved cellular network");
        }
        resolved
    }
}

/// Wi-Fi networks with their transport info.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WifiView;

impl NetworkView for WifiView {
    type Entry = Option<WifiInfo>;

    fn request(&self) -> NetworkRequest {
        NetworkRequest::wifi_internet()
    }

    fn project(&self, _network: NetworkHandle, caps: &NetworkCapabilities) -> Option<Self::Entry> {
        caps.has_transport(Transport::Wifi)
            .then(|| caps.wifi_info.clone())
    }
}
