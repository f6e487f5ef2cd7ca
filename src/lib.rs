//! Diag Observers - delta-driven observers for positioning, telephony,
//! network and log telemetry.

pub mod config;
pub mod display;
pub mod logstream;
pub mod network;
pub mod positioning;
pub mod service;
pub mod session;
pub mod telephony;
