//! Subscription observer: per-slot identity tracking and per-subscription
//! callback bundles.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::session::{
    require_all, CallbackSink, ListenerHandle, ObservableSession, ObserverError, ObserverSession,
    Permission, PermissionCheck, SessionState, TaskQueue,
};

use super::platform::{SubscriptionCallback, TelephonyPlatform};
use super::slots::SubscriptionSlotTable;
use super::types::{
    CellInfo, DataActivity, DisplayInfo, ServiceState, SubscriptionId, SubscriptionInfo,
};

const TELEPHONY_PERMISSIONS: [Permission; 2] = [Permission::FineLocation, Permission::ReadPhoneState];

/// Events published to subscription listeners. Per-subscription events carry
/// the owning subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyEvent {
    /// A slot gained, changed or (with `None`) lost its subscription.
    SubscriptionChanged {
        slot: usize,
        info: Option<SubscriptionInfo>,
    },
    /// Full slot mapping, once per batch of slot changes.
    SubscriptionsChanged(BTreeMap<usize, SubscriptionInfo>),
    CellInfoChanged {
        subscription: SubscriptionInfo,
        cells: Vec<CellInfo>,
    },
    DisplayInfoChanged {
        subscription: SubscriptionInfo,
        display: DisplayInfo,
    },
    DataActivity {
        subscription: SubscriptionInfo,
        activity: DataActivity,
    },
    ServiceStateChanged {
        subscription: SubscriptionInfo,
        state: ServiceState,
    },
}

#[derive(Debug)]
enum Work {
    CheckSlots,
    Subscription {
        slot: usize,
        subscription: SubscriptionId,
        callback: SubscriptionCallback,
    },
    Reset,
}

struct SlotTracker<P> {
    platform: Arc<P>,
    table: SubscriptionSlotTable,
    events: mpsc::UnboundedSender<TelephonyEvent>,
    sink: CallbackSink<Work>,
}

impl<P: TelephonyPlatform> SlotTracker<P> {
    fn handle(&mut self, work: Work) {
        match work {
            Work::CheckSlots => self.check_slots(),
            Work::Subscription {
                slot,
                subscription,
                callback,
            } => self.on_subscription_callback(slot, subscription, callback),
            Work::Reset => {
                for handle in self.table.clear_all() {
                    self.platform.unregister_subscription_callbacks(handle);
                }
                tracing::debug!("Subscription slots reset");
            }
        }
    }

    fn emit(&self, event: TelephonyEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Telephony listener gone, dropping event");
        }
    }

    /// Sink for one subscription's bundle, tagged with its owner.
    fn bundle_sink(&self, slot: usize, subscription: SubscriptionId) -> CallbackSink<SubscriptionCallback> {
        self.sink.map(move |callback| Work::Subscription {
            slot,
            subscription,
            callback,
        })
    }

    fn check_slots(&mut self) {
        let mut any_changed = false;
        for slot in 0..self.table.len() {
            let changed = self.check_slot(slot);
            any_changed |= changed;
            tracing::debug!(
                slot,
                subscription = ?self.table.identity(slot),
                changed,
                "Slot checked"
            );
        }
        if any_changed {
            self.emit(TelephonyEvent::SubscriptionsChanged(self.table.snapshot()));
        }
    }

    fn check_slot(&mut self, slot: usize) -> bool {
        let current = self.platform.active_subscription_for_slot(slot);
        let recorded = self.table.identity(slot);

        let Some(info) = current else {
            if recorded.is_none() {
                return false;
            }
            if let Some(handle) = self.table.clear(slot) {
                self.platform.unregister_subscription_callbacks(handle);
            }
            self.emit(TelephonyEvent::SubscriptionChanged { slot, info: None });
            return true;
        };

        if recorded == Some(info.id) {
            return false;
        }

        // Old bundle goes before the new one is installed.
        if let Some(handle) = self.table.clear(slot) {
            self.platform.unregister_subscription_callbacks(handle);
        }
        let sink = self.bundle_sink(slot, info.id);
        match self.platform.register_subscription_callbacks(info.id, sink) {
            Ok(handle) => {
                self.table.assign(slot, info.clone(), handle);
                self.emit(TelephonyEvent::SubscriptionChanged {
                    slot,
                    info: Some(info),
                });
            }
            Err(e) => {
                tracing::warn!(slot, subscription = %info.id, error = %e, "Subscription callbacks refused, slot left empty");
                if recorded.is_some() {
                    self.emit(TelephonyEvent::SubscriptionChanged { slot, info: None });
                } else {
                    return false;
                }
            }
        }
        true
    }

    fn on_subscription_callback(
        &mut self,
        slot: usize,
        subscription: SubscriptionId,
        callback: SubscriptionCallback,
    ) {
        let Some(info) = self.table.holding(slot, subscription).cloned() else {
            tracing::trace!(slot, %subscription, "Stale subscription callback dropped");
            return;
        };

        match callback {
            SubscriptionCallback::CellInfoChanged(cells) => {
                self.emit(TelephonyEvent::CellInfoChanged {
                    subscription: info,
                    cells,
                });
            }
            SubscriptionCallback::DisplayInfoChanged(display) => {
                self.emit(TelephonyEvent::DisplayInfoChanged {
                    subscription: info,
                    display,
                });
            }
            SubscriptionCallback::DataActivity(activity) => {
                self.emit(TelephonyEvent::DataActivity {
                    subscription: info,
                    activity,
                });
            }
            SubscriptionCallback::ServiceStateChanged(state) => {
                tracing::debug!(slot, %subscription, ?state, "Service state changed");
                let sink = self.bundle_sink(slot, subscription);
                if let Err(e) = self.platform.request_cell_info_update(subscription, sink) {
                    tracing::warn!(%subscription, error = %e, "Cell info refresh refused");
                }
                self.emit(TelephonyEvent::ServiceStateChanged {
                    subscription: info,
                    state,
                });
            }
        }
    }
}

/// Observer for subscription identity and per-subscription radio state.
pub struct SubscriptionObserver<P: TelephonyPlatform> {
    platform: Arc<P>,
    queue: TaskQueue<Work>,
    permissions: Arc<dyn PermissionCheck>,
    session: ObserverSession,
    listener: Option<ListenerHandle>,
}

impl<P: TelephonyPlatform> SubscriptionObserver<P> {
    /// Create an observer sized to the platform's modem count.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        platform: Arc<P>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> (Self, mpsc::UnboundedReceiver<TelephonyEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let slots = platform.supported_modem_count();
        let tracker_platform = Arc::clone(&platform);

        let queue = TaskQueue::spawn_with("telephony", move |sink: CallbackSink<Work>| {
            let mut tracker = SlotTracker {
                platform: tracker_platform,
                table: SubscriptionSlotTable::new(slots),
                events,
                sink,
            };
            move |work| tracker.handle(work)
        });

        (
            Self {
                platform,
                queue,
                permissions,
                session: ObserverSession::new("telephony"),
                listener: None,
            },
            rx,
        )
    }

    #[must_use]
    pub fn default_subscription_id(&self) -> Option<SubscriptionId> {
        self.platform.default_subscription_id()
    }

    /// Roaming flag of a subscription's service state; false if unknown.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` without phone-state and location permission.
    pub fn is_roaming(&self, subscription: SubscriptionId) -> Result<bool, ObserverError> {
        require_all(
            self.permissions.as_ref(),
            &[Permission::ReadPhoneState, Permission::CoarseLocation],
        )?;
        Ok(self
            .platform
            .service_state(subscription)
            .is_some_and(|state| state.roaming))
    }

    /// Wait until every queued callback has been handled.
    ///
    /// # Errors
    ///
    /// Returns `ObserverError::ChannelClosed` if the queue has shut down.
    pub async fn flush(&self) -> Result<(), ObserverError> {
        self.queue.flush().await
    }

    pub async fn shutdown(mut self) {
        let _ = self.stop_observing();
        self.queue.shutdown().await;
    }
}

impl<P: TelephonyPlatform> ObservableSession for SubscriptionObserver<P> {
    fn start_observing(&mut self) -> Result<(), ObserverError> {
        require_all(self.permissions.as_ref(), &TELEPHONY_PERMISSIONS)?;
        if self.session.is_observing() {
            tracing::debug!("Subscription observer already observing");
            return Ok(());
        }

        let sink = self.queue.sink().map(|()| Work::CheckSlots);
        self.listener = Some(self.platform.add_subscriptions_listener(sink)?);
        self.session.begin();
        self.queue.push(Work::CheckSlots);
        Ok(())
    }

    fn stop_observing(&mut self) -> Result<(), ObserverError> {
        if !self.session.end() {
            return Ok(());
        }
        if let Some(handle) = self.listener.take() {
            self.platform.remove_subscriptions_listener(handle);
        }
        // Bundles are unregistered on the queue, after any pending check.
        self.queue.push(Work::Reset);
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.session.state()
    }
}
