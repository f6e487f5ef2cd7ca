//! GNSS engine data: satellite status, raw measurements, navigation
//! messages and engine capabilities.

use serde::{Deserialize, Serialize};

/// Satellite constellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constellation {
    #[default]
    Unknown,
    Gps,
    Sbas,
    Glonass,
    Qzss,
    Beidou,
    Galileo,
    Irnss,
}

const PRN_OFFSET_GLONASS: u32 = 64;
const PRN_OFFSET_BEIDOU: u32 = 200;
const PRN_OFFSET_GALILEO: u32 = 300;

/// Status of one tracked satellite signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SatelliteInfo {
    pub constellation: Constellation,
    pub svid: u32,
    pub cn0_dbhz: f32,
    pub carrier_frequency_hz: Option<f64>,
    pub has_almanac: bool,
    pub has_ephemeris: bool,
    pub used_in_fix: bool,
}

impl SatelliteInfo {
    /// PRN in the diagnostic-monitor numbering, where GLONASS, BeiDou and
    /// Galileo are shifted into their own ranges.
    #[must_use]
    pub fn diag_prn(&self) -> u32 {
        self.svid
            + match self.constellation {
                Constellation::Glonass => PRN_OFFSET_GLONASS,
                Constellation::Beidou => PRN_OFFSET_BEIDOU,
                Constellation::Galileo => PRN_OFFSET_GALILEO,
                _ => 0,
            }
    }

    /// Named signal band (`L1`, `E5a`, `B1I`, ...) for the carrier frequency.
    #[must_use]
    pub fn signal_band(&self) -> Option<&'static str> {
        let mhz = self.carrier_frequency_hz? / 1_000_000.0;
        let near = |center: f64| near_frequency(mhz, center, 1.0);
        let within = |start: f64, stop: f64| (start - 0.1..=stop + 0.1).contains(&mhz);

        match self.constellation {
            Constellation::Gps => pick(&[
                (near(1575.42), "L1"),
                (near(1227.60), "L2"),
                (near(1176.45), "L5"),
            ]),
            Constellation::Glonass => pick(&[
                (within(1598.0625, 1607.0625), "L1"),
                (within(1242.9375, 1249.9375), "L2"),
                (within(1201.743, 1208.511), "L3"),
            ]),
            Constellation::Galileo => pick(&[
                (near(1575.42), "E1"),
                (near(1278.75), "E6"),
                (near(1191.795), "E5"),
                (near(1176.45), "E5a"),
                (near(1207.14), "E5b"),
            ]),
            Constellation::Beidou => pick(&[
                (near(1561.098), "B1I"),
                (near(1575.42), "B1C"),
                (near(1176.45), "B2a"),
                (near(1207.14), "B2b"),
                (near(1268.52), "B3"),
            ]),
            Constellation::Qzss => pick(&[
                (near(1575.42), "L1"),
                (near(1227.6), "L2"),
                (near(1176.45), "L5"),
                (near(1278.75), "L6"),
            ]),
            Constellation::Irnss => pick(&[(near(1176.45), "L5"), (near(2492.028), "S")]),
            Constellation::Sbas => pick(&[(near(1575.42), "L1"), (near(1176.45), "L5")]),
            Constellation::Unknown => None,
        }
    }

    /// Band name, or the carrier in GHz when no band matches.
    #[must_use]
    pub fn signal_label(&self) -> String {
        match (self.signal_band(), self.carrier_frequency_hz) {
            (Some(band), _) => band.to_string(),
            (None, Some(hz)) => format!("{:.3}", hz / 1_000_000_000.0),
            (None, None) => "-".to_string(),
        }
    }

    /// Three-character flag string: almanac, ephemeris, used-in-fix.
    #[must_use]
    pub fn flags(&self) -> String {
        [
            (self.has_almanac, 'A'),
            (self.has_ephemeris, 'E'),
            (self.used_in_fix, 'U'),
        ]
        .iter()
        .map(|(set, c)| if *set { *c } else { '-' })
        .collect()
    }
}

fn near_frequency(mhz: f64, center: f64, tolerance: f64) -> bool {
    (mhz - center).abs() <= tolerance
}

fn pick(candidates: &[(bool, &'static str)]) -> Option<&'static str> {
    candidates.iter().find(|(hit, _)| *hit).map(|(_, name)| *name)
}

/// Satellite status snapshot reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GnssStatus {
    pub satellites: Vec<SatelliteInfo>,
}

impl GnssStatus {
    #[must_use]
    pub fn used_in_fix_count(&self) -> usize {
        self.satellites.iter().filter(|s| s.used_in_fix).count()
    }

    #[must_use]
    pub fn any_used_in_fix(&self) -> bool {
        self.satellites.iter().any(|s| s.used_in_fix)
    }
}

/// Multipath indicator of a raw measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultipathIndicator {
    #[default]
    Unknown,
    Detected,
    NotDetected,
}

/// One raw measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GnssMeasurement {
    pub constellation: Constellation,
    pub svid: u32,
    pub cn0_dbhz: f64,
    pub multipath: MultipathIndicator,
    pub agc_level_db: Option<f64>,
}

/// A batch of raw measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GnssMeasurementsEvent {
    pub measurements: Vec<GnssMeasurement>,
    /// Whether the engine reports full (duty-cycle free) tracking.
    ///
    /// `None` means the platform has no way to report the flag. A platform
    /// that can report it but leaves it unset gives `Some(false)`.
    pub is_full_tracking: Option<bool>,
}

impl GnssMeasurementsEvent {
    /// Full-tracking state; platforms that cannot report it count as tracking.
    #[must_use]
    pub fn full_tracking(&self) -> bool {
        self.is_full_tracking.unwrap_or(true)
    }

    #[must_use]
    pub fn multipath_sv_count(&self) -> usize {
        self.measurements
            .iter()
            .filter(|m| m.multipath == MultipathIndicator::Detected)
            .count()
    }

    /// Mean AGC level over measurements that report one; NaN if none do.
    #[must_use]
    pub fn agc_average(&self) -> f64 {
        let levels: Vec<f64> = self
            .measurements
            .iter()
            .filter_map(|m| m.agc_level_db)
            .collect();
        if levels.is_empty() {
            return f64::NAN;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = levels.len() as f64;
        levels.iter().sum::<f64>() / count
    }
}

/// A navigation message frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationMessage {
    pub svid: u32,
    pub message_type: u16,
    pub submessage_id: u16,
    pub data: Vec<u8>,
}

/// Engine capability flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GnssCapabilities {
    pub measurements: bool,
    pub navigation_messages: bool,
    pub measurement_corrections: bool,
    pub antenna_info: bool,
    pub satellite_blocklist: bool,
    pub low_power_mode: bool,
}

/// Capabilities plus hardware identity, as published to listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GnssHardware {
    pub capabilities: GnssCapabilities,
    pub model_name: Option<String>,
    pub year_of_hardware: u32,
}
