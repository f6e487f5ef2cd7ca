//! Telephony data model: subscriptions, cells, display info and data activity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical subscription identity, distinct from the slot that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub i32);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An active subscription as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub slot: usize,
    pub display_name: String,
    pub carrier_name: String,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
}

impl SubscriptionInfo {
    #[must_use]
    pub fn new(id: i32, slot: usize) -> Self {
        Self {
            id: SubscriptionId(id),
            slot,
            display_name: String::new(),
            carrier_name: String::new(),
            mcc: None,
            mnc: None,
        }
    }

    /// `mcc-mnc` when both are known.
    #[must_use]
    pub fn plmn(&self) -> Option<String> {
        match (&self.mcc, &self.mnc) {
            (Some(mcc), Some(mnc)) => Some(format!("{mcc}-{mnc}")),
            _ => None,
        }
    }
}

/// Radio access technology of a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellTechnology {
    #[default]
    Unknown,
    Gsm,
    Cdma,
    Wcdma,
    TdScdma,
    Lte,
    Nr,
}

/// One serving or neighbouring cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInfo {
    pub technology: CellTechnology,
    pub registered: bool,
    pub cell_identity: Option<u64>,
    pub physical_cell_id: Option<u32>,
    pub channel: Option<u32>,
    pub signal_dbm: Option<i32>,
    pub timestamp_ns: u64,
}

/// Radio network type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkType {
    #[default]
    Unknown,
    Gprs,
    Edge,
    Umts,
    Cdma,
    Evdo0,
    EvdoA,
    OneXRtt,
    Hsdpa,
    Hsupa,
    Hspa,
    Iden,
    EvdoB,
    Lte,
    Ehrpd,
    Hspap,
    Gsm,
    TdScdma,
    Iwlan,
    Nr,
}

/// Display override applied on top of the radio network type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideNetworkType {
    #[default]
    None,
    LteCa,
    LteAdvancedPro,
    NrNsa,
    NrAdvanced,
}

/// Network type as shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub network_type: NetworkType,
    pub override_network_type: OverrideNetworkType,
}

impl DisplayInfo {
    #[must_use]
    pub fn label(&self) -> &'static str {
        network_type_label(self.network_type, self.override_network_type)
    }
}

/// Short label for a network type. The override only refines LTE.
#[must_use]
pub fn network_type_label(network: NetworkType, override_type: OverrideNetworkType) -> &'static str {
    match network {
        NetworkType::Gprs => "GPRS",
        NetworkType::Edge => "EDGE",
        NetworkType::Umts => "UMTS",
        NetworkType::Cdma => "CDMA",
        NetworkType::Evdo0 => "EVDO_0",
        NetworkType::EvdoA => "EVDO_A",
        NetworkType::OneXRtt => "1xRTT",
        NetworkType::Hsdpa => "HSDPA",
        NetworkType::Hsupa => "HSUPA",
        NetworkType::Hspa => "HSPA",
        NetworkType::Iden => "IDEN",
        NetworkType::EvdoB => "EVDO_B",
        NetworkType::Lte => match override_type {
            OverrideNetworkType::LteCa => "LTE_CA",
            OverrideNetworkType::LteAdvancedPro => "LTE_ADV_PRO",
            OverrideNetworkType::NrNsa => "NR_NSA",
            OverrideNetworkType::NrAdvanced => "NR_ADVANCED",
            OverrideNetworkType::None => "LTE",
        },
        NetworkType::Ehrpd => "EHRPD",
        NetworkType::Hspap => "HSPAP",
        NetworkType::Gsm => "GSM",
        NetworkType::TdScdma => "TD_SCDMA",
        NetworkType::Iwlan => "IWLAN",
        NetworkType::Nr => "NR",
        NetworkType::Unknown => "UNKNOWN",
    }
}

/// Direction of data traffic on a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataActivity {
    #[default]
    None,
    In,
    Out,
    InOut,
    Dormant,
}

/// Arrow glyph for a data activity direction.
#[must_use]
pub fn data_activity_symbol(activity: DataActivity) -> &'static str {
    match activity {
        DataActivity::In => " ↓",
        DataActivity::Out => "↑ ",
        DataActivity::InOut => "⇅",
        DataActivity::Dormant => "~",
        DataActivity::None => "-",
    }
}

/// Voice/data registration state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationState {
    InService,
    #[default]
    OutOfService,
    EmergencyOnly,
    PowerOff,
}

/// Service state of a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    pub state: RegistrationState,
    pub roaming: bool,
    pub operator_name: Option<String>,
}
