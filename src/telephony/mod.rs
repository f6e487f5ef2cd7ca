//! Telephony: subscription slots and per-subscription radio state.

mod observer;
mod platform;
mod slots;
mod types;

pub use observer::{SubscriptionObserver, TelephonyEvent};
pub use platform::{SubscriptionCallback, TelephonyPlatform};
pub use slots::SubscriptionSlotTable;
pub use types::{
    data_activity_symbol, network_type_label, CellInfo, CellTechnology, DataActivity, DisplayInfo,
    NetworkType, OverrideNetworkType, RegistrationState, ServiceState, SubscriptionId,
    SubscriptionInfo,
};
