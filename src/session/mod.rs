//! Observer lifecycle plumbing shared by every observer.
//!
//! Provides the start/stop contract, permission gating, error taxonomy,
//! and the serial task queue that decouples platform callbacks from
//! listener delivery.

mod error;
mod permission;
mod queue;
mod sink;
mod state;

pub use error::{ObserverError, PlatformError, Precondition};
pub use permission::{require_all, require_any, AllowAll, Permission, PermissionCheck};
pub use queue::{recv_within, TaskQueue};
pub use sink::CallbackSink;
pub use state::{ObservableSession, ObserverSession, SessionState};

/// Identifies one platform registration so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(pub u64);
