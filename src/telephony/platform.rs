//! Boundary to the platform telephony stack.

use crate::session::{CallbackSink, ListenerHandle, PlatformError};

use super::types::{CellInfo, DataActivity, DisplayInfo, ServiceState, SubscriptionId, SubscriptionInfo};

/// Callbacks delivered by a per-subscription callback bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionCallback {
    CellInfoChanged(Vec<CellInfo>),
    DisplayInfoChanged(DisplayInfo),
    DataActivity(DataActivity),
    ServiceStateChanged(ServiceState),
}

/// The platform telephony stack.
pub trait TelephonyPlatform: Send + Sync + 'static {
    /// Number of physical subscription slots.
    fn supported_modem_count(&self) -> usize;

    fn active_subscription_for_slot(&self, slot: usize) -> Option<SubscriptionInfo>;

    /// Listen for subscription-list changes. The sink receives `()` per change.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` if the listener is refused.
    fn add_subscriptions_listener(&self, sink: CallbackSink<()>) -> Result<ListenerHandle, PlatformError>;

    fn remove_subscriptions_listener(&self, handle: ListenerHandle);

    /// Install the callback bundle for one subscription.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` if the bundle cannot be registered.
    fn register_subscription_callbacks(
        &self,
        subscription: SubscriptionId,
        sink: CallbackSink<SubscriptionCallback>,
    ) -> Result<ListenerHandle, PlatformError>;

    fn unregister_subscription_callbacks(&self, handle: ListenerHandle);

    /// Ask for a fresh cell list. The answer arrives later on `sink` as
    /// `SubscriptionCallback::CellInfoChanged`.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` if the request is refused.
    fn request_cell_info_update(
        &self,
        subscription: SubscriptionId,
        sink: CallbackSink<SubscriptionCallback>,
    ) -> Result<(), PlatformError>;

    fn default_subscription_id(&self) -> Option<SubscriptionId>;

    fn service_state(&self, subscription: SubscriptionId) -> Option<ServiceState>;
}
