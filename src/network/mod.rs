//! Network capability sets: all, cellular data and Wi-Fi views.

mod observer;
mod platform;
mod types;
mod view;

pub use observer::{
    CellularDataObserver, NetworkCapabilitySetObserver, NetworkEvent, NetworkObserver,
    NetworkSnapshot, WifiObserver,
};
pub use platform::{ConnectivityPlatform, NetworkCallback};
pub use types::{Capability, NetworkCapabilities, NetworkHandle, NetworkRequest, Transport, WifiInfo};
pub use view::{AllNetworks, CellularView, NetworkView, SubscriptionResolver, WifiView};
