//! Host-supplied permission predicate.

use std::fmt;

use super::ObserverError;

/// Runtime permissions the observers depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    FineLocation,
    CoarseLocation,
    ReadPhoneState,
    NetworkState,
    ReadLogs,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FineLocation => "ACCESS_FINE_LOCATION",
            Self::CoarseLocation => "ACCESS_COARSE_LOCATION",
            Self::ReadPhoneState => "READ_PHONE_STATE",
            Self::NetworkState => "ACCESS_NETWORK_STATE",
            Self::ReadLogs => "READ_LOGS",
        };
        f.write_str(name)
    }
}

/// Answers whether a permission is currently granted.
pub trait PermissionCheck: Send + Sync {
    fn is_granted(&self, permission: Permission) -> bool;
}

impl<F> PermissionCheck for F
where
    F: Fn(Permission) -> bool + Send + Sync,
{
    fn is_granted(&self, permission: Permission) -> bool {
        self(permission)
    }
}

/// Grants everything. Used by the CLI, where the host is the user's shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn is_granted(&self, _permission: Permission) -> bool {
        true
    }
}

/// Fail with the first permission in `required` that is not granted.
///
/// # Errors
///
/// Returns `ObserverError::PermissionDenied` naming the missing permission.
pub fn require_all(
    check: &dyn PermissionCheck,
    required: &[Permission],
) -> Result<(), ObserverError> {
    match required.iter().find(|p| !check.is_granted(**p)) {
        Some(missing) => Err(ObserverError::PermissionDenied(*missing)),
        None => Ok(()),
    }
}

/// Succeed if at least one permission in `any_of` is granted.
///
/// # Errors
///
/// Returns `ObserverError::PermissionDenied` naming the first candidate
/// when none is granted.
pub fn require_any(check: &dyn PermissionCheck, any_of: &[Permission]) -> Result<(), ObserverError> {
    if any_of.is_empty() || any_of.iter().any(|p| check.is_granted(*p)) {
        Ok(())
    } else {
        Err(ObserverError::PermissionDenied(any_of[0]))
    }
}
