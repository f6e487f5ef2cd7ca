//! Observer error types.

use std::time::Duration;

use crate::logstream::ProcessError;

use super::Permission;

/// A violated precondition on a synchronous observer call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    /// `set_options` was never called.
    #[error("Location options are not set")]
    OptionsNotSet,
    /// Options name an empty provider.
    #[error("Provider name is empty")]
    EmptyProvider,
    /// The operation only applies to the GNSS provider.
    #[error("Provider is not gps: {0}")]
    ProviderNotGnss(String),
}

/// Errors reported by platform collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The platform does not implement this registration.
    #[error("Unsupported by platform: {0}")]
    Unsupported(&'static str),
    /// The platform refused the request.
    #[error("Rejected by platform: {0}")]
    Rejected(String),
}

/// Errors that can occur while driving an observer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// Invalid or missing options, or wrong provider for the operation.
    #[error("Precondition failed: {0}")]
    Precondition(#[from] Precondition),

    /// A required permission is not granted by the host.
    #[error("Permission denied: {0}")]
    PermissionDenied(Permission),

    /// Requested provider or transport is absent or disabled.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A bounded wait elapsed.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The external log process failed.
    #[error("Log process error: {0}")]
    Process(#[from] ProcessError),

    /// A platform registration failed.
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// The event channel was closed.
    #[error("Channel closed")]
    ChannelClosed,
}

impl ObserverError {
    /// Whether this error is a caller-side precondition violation
    /// (including missing permissions), as opposed to "no data yet".
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_) | Self::PermissionDenied(_))
    }
}
