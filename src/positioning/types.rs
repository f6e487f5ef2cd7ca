//! Location data model and locating options.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Satellite positioning provider.
pub const GPS_PROVIDER: &str = "gps";
/// Cell / Wi-Fi based provider.
pub const NETWORK_PROVIDER: &str = "network";
/// Fused provider.
pub const FUSED_PROVIDER: &str = "fused";
/// Passive provider (piggybacks on other requests).
pub const PASSIVE_PROVIDER: &str = "passive";

/// Extra command understood by the GNSS provider.
pub const DELETE_AIDING_DATA_COMMAND: &str = "delete_aiding_data";

/// How fixes are requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    /// Exactly one fix, then automatic teardown.
    Single,
    /// Unbounded continuous fixes.
    #[default]
    Track,
    /// The last cached fix, republished once.
    Last,
}

impl fmt::Display for LocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::Track => "track",
            Self::Last => "last",
        })
    }
}

/// Quality tier of a location request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Balanced,
    High,
    LowPower,
}

impl Quality {
    /// Platform quality constant.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::High => 100,
            Self::Balanced => 102,
            Self::LowPower => 104,
        }
    }

    /// Parse a platform quality constant.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            100 => Some(Self::High),
            102 => Some(Self::Balanced),
            104 => Some(Self::LowPower),
            _ => None,
        }
    }
}

/// Provider, mode and quality for the next `start_locating`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOptions {
    pub provider: String,
    pub mode: LocationMode,
    pub quality: Quality,
}

impl LocationOptions {
    #[must_use]
    pub fn new(provider: impl Into<String>, mode: LocationMode, quality: Quality) -> Self {
        Self {
            provider: provider.into(),
            mode,
            quality,
        }
    }

    /// Whether these options target the satellite provider.
    #[must_use]
    pub fn is_gnss(&self) -> bool {
        self.provider == GPS_PROVIDER
    }
}

/// A request for location updates, derived from the options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    pub quality: Quality,
    pub interval_ms: u64,
    pub max_updates: u32,
}

impl LocationRequest {
    /// One update for `Single`, unbounded for `Track`, none for `Last`.
    #[must_use]
    pub fn for_mode(mode: LocationMode, quality: Quality) -> Option<Self> {
        let max_updates = match mode {
            LocationMode::Single => 1,
            LocationMode::Track => u32::MAX,
            LocationMode::Last => return None,
        };
        Some(Self {
            quality,
            interval_ms: 0,
            max_updates,
        })
    }
}

/// A single resolved position estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub provider: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<f64>,
    pub accuracy_m: Option<f32>,
    pub vertical_accuracy_m: Option<f32>,
    pub speed_mps: Option<f32>,
    pub bearing_deg: Option<f32>,
    pub bearing_accuracy_deg: Option<f32>,
    /// UTC time of the fix in milliseconds since the epoch.
    pub time_ms: i64,
    /// Monotonic time of the fix.
    pub elapsed_realtime_ns: u64,
    /// Satellites used, when the provider reports it.
    pub satellites: Option<u32>,
    /// Network location source (`wifi`, `cell`), when reported.
    pub network_location_type: Option<String>,
}

impl Location {
    /// Provider name decorated with the network type and satellite count.
    #[must_use]
    pub fn provider_label(&self) -> String {
        let mut label = self.provider.clone();
        if let Some(kind) = self.network_location_type.as_deref().filter(|k| !k.is_empty()) {
            label.push_str(&format!("({kind})"));
        }
        if let Some(count) = self.satellites {
            label.push_str(&format!("({count})"));
        }
        label
    }
}

/// Categories of assistance data the GNSS engine can be told to forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AidingDataCategory {
    All,
    Ephemeris,
    Almanac,
    Position,
    Time,
    Iono,
    Utc,
    Health,
    Svdir,
    Svsteer,
    Sadata,
    Rti,
    CelldbInfo,
}

impl AidingDataCategory {
    /// Every category, in the order the engine documents them.
    pub const ALL: [Self; 13] = [
        Self::All,
        Self::Ephemeris,
        Self::Almanac,
        Self::Position,
        Self::Time,
        Self::Iono,
        Self::Utc,
        Self::Health,
        Self::Svdir,
        Self::Svsteer,
        Self::Sadata,
        Self::Rti,
        Self::CelldbInfo,
    ];

    /// Cold start: forget everything.
    pub const PRESET_COLD: [Self; 1] = [Self::All];

    /// Warm start: forget ephemeris and UTC model.
    pub const PRESET_WARM: [Self; 2] = [Self::Ephemeris, Self::Utc];

    /// Key used in the command extras.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Ephemeris => "ephemeris",
            Self::Almanac => "almanac",
            Self::Position => "position",
            Self::Time => "time",
            Self::Iono => "iono",
            Self::Utc => "utc",
            Self::Health => "health",
            Self::Svdir => "svdir",
            Self::Svsteer => "svsteer",
            Self::Sadata => "sadata",
            Self::Rti => "rti",
            Self::CelldbInfo => "celldb-info",
        }
    }

    /// Encode a selection as the boolean-flag command extras.
    #[must_use]
    pub fn to_extras(categories: &[Self]) -> BTreeMap<String, bool> {
        categories
            .iter()
            .map(|c| (c.as_str().to_string(), true))
            .collect()
    }
}

impl fmt::Display for AidingDataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
