//! Boundary to the platform connectivity stack.

use crate::session::{CallbackSink, ListenerHandle, PlatformError};

use super::types::{NetworkCapabilities, NetworkHandle, NetworkRequest};

/// Raw capability-listener callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCallback {
    CapabilitiesChanged(NetworkHandle, NetworkCapabilities),
    Lost(NetworkHandle),
    /// No network can satisfy the request.
    Unavailable,
}

pub trait ConnectivityPlatform: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns a `PlatformError` if the listener is refused.
    fn register_network_callback(
        &self,
        request: &NetworkRequest,
        sink: CallbackSink<NetworkCallback>,
    ) -> Result<ListenerHandle, PlatformError>;

    fn unregister_network_callback(&self, handle: ListenerHandle);

    /// The system default network.
    fn active_network(&self) -> Option<NetworkHandle>;
}
