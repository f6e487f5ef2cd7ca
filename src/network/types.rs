//! Network capability data model.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::telephony::SubscriptionId;

/// Platform identity of one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkHandle(pub u64);

impl fmt::Display for NetworkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Cellular,
    Wifi,
    Bluetooth,
    Ethernet,
    Vpn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Internet,
    Validated,
    NotMetered,
    NotRoaming,
    NotSuspended,
    Ims,
    Mms,
}

/// Wi-Fi specific transport info.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiInfo {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub rssi_dbm: i32,
    pub frequency_mhz: u32,
    pub link_speed_mbps: u32,
}

/// Capability snapshot of one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCapabilities {
    pub transports: BTreeSet<Transport>,
    pub capabilities: BTreeSet<Capability>,
    /// Owning subscription of a cellular network.
    pub subscription_id: Option<SubscriptionId>,
    /// Transport info of a Wi-Fi network.
    pub wifi_info: Option<WifiInfo>,
    pub downstream_kbps: u32,
    pub upstream_kbps: u32,
}

impl NetworkCapabilities {
    #[must_use]
    pub fn has_transport(&self, transport: Transport) -> bool {
        self.transports.contains(&transport)
    }

    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Filter a capability listener is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub transport: Transport,
    pub capability: Capability,
}

impl NetworkRequest {
    #[must_use]
    pub fn cellular_internet() -> Self {
        Self {
            transport: Transport::Cellular,
            capability: Capability::Internet,
        }
    }

    #[must_use]
    pub fn wifi_internet() -> Self {
        Self {
            transport: Transport::Wifi,
            capability: Capability::Internet,
        }
    }

    #[must_use]
    pub fn matches(&self, caps: &NetworkCapabilities) -> bool {
        caps.has_transport(self.transport) && caps.has_capability(self.capability)
    }
}
