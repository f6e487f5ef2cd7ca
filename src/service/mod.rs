//! Long-lived services built on the observers.

mod aggregation;

pub use aggregation::{AggregationService, LogsUpdate, TrackerTotals, ALL_CATEGORY};
