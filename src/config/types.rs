//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::logstream::{
    FilterError, LineCategory, LineFilter, LogCommand, MatchMode, BUFFER_DEFAULT, DEFAULT_BINARY,
};
use crate::positioning::{LocationMode, Quality, GPS_PROVIDER};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub positioning: PositioningConfig,
    pub tracker: TrackerConfig,
}

/// Defaults for the positioning observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    pub provider: String,
    pub mode: LocationMode,
    pub quality: Quality,
    /// Ask for duty-cycle free tracking when measurements are registered.
    pub force_full_tracking: bool,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            provider: GPS_PROVIDER.to_string(),
            mode: LocationMode::Track,
            quality: Quality::Balanced,
            force_full_tracking: false,
        }
    }
}

/// One log category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub pattern: String,
    /// Keep a dedicated buffer; otherwise lines only feed the "all" buffer.
    #[serde(default = "default_keep_buffer")]
    pub keep_buffer: bool,
}

fn default_keep_buffer() -> bool {
    true
}

impl CategoryConfig {
    fn new(name: &str, pattern: &str, keep_buffer: bool) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            keep_buffer,
        }
    }
}

const LMS_PATTERN: &str = ".*LocationManagerService:.*";
const ENV_BEARING_PATTERN: &str = ".*hasEnvironmentBearing.*";
const BLUESKY_PATTERN: &str = ".*(Bluesky(Manager|Registrant)|GCoreFlp):.*";

/// Background log tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub binary: String,
    pub buffer: String,
    pub extra_args: Vec<String>,
    /// Lines matching none of these are dropped. Empty keeps everything.
    pub filters: Vec<String>,
    pub match_mode: MatchMode,
    /// Cap per buffer.
    pub max_lines: usize,
    pub update_interval_ms: u64,
    pub categories: Vec<CategoryConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            buffer: BUFFER_DEFAULT.to_string(),
            extra_args: [
                "-s",
                "LocationManagerService:*",
                "LocSvc_ApiV02:*",
                "BlueskyManager:*",
                "BlueskyRegistrant:*",
                "GCoreFlp:*",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            filters: [LMS_PATTERN, ENV_BEARING_PATTERN, BLUESKY_PATTERN]
                .into_iter()
                .map(String::from)
                .collect(),
            match_mode: MatchMode::First,
            max_lines: 10_000,
            update_interval_ms: 1_000,
            categories: vec![
                CategoryConfig::new("location-manager", LMS_PATTERN, false),
                CategoryConfig::new("env-bearing", ENV_BEARING_PATTERN, true),
                CategoryConfig::new("bluesky", BLUESKY_PATTERN, true),
            ],
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn command(&self) -> LogCommand {
        LogCommand::new()
            .binary(&self.binary)
            .buffer(&self.buffer)
            .extra_args(self.extra_args.iter().cloned())
    }

    /// # Errors
    ///
    /// Returns `FilterError` if a filter pattern is invalid.
    pub fn line_filter(&self) -> Result<LineFilter, FilterError> {
        LineFilter::from_patterns(&self.filters)
    }

    /// # Errors
    ///
    /// Returns `FilterError` if a category pattern is invalid.
    pub fn line_categories(&self) -> Result<Vec<LineCategory>, FilterError> {
        self.categories
            .iter()
            .map(|c| LineCategory::new(&c.name, &c.pattern))
            .collect()
    }
}
