//! Per-slot subscription table.

use std::collections::BTreeMap;

use crate::session::ListenerHandle;

use super::types::{SubscriptionId, SubscriptionInfo};

#[derive(Debug, Clone, Default)]
struct Slot {
    held: Option<(SubscriptionInfo, ListenerHandle)>,
}

/// Fixed-length table of slots. A slot has a callback handle exactly when it
/// holds a subscription, so both live in one `Option`.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSlotTable {
    slots: Vec<Slot>,
}

impl SubscriptionSlotTable {
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![Slot::default(); count],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn identity(&self, slot: usize) -> Option<SubscriptionId> {
        self.info(slot).map(|info| info.id)
    }

    #[must_use]
    pub fn info(&self, slot: usize) -> Option<&SubscriptionInfo> {
        self.slots.get(slot)?.held.as_ref().map(|(info, _)| info)
    }

    #[must_use]
    pub fn handle(&self, slot: usize) -> Option<ListenerHandle> {
        self.slots.get(slot)?.held.as_ref().map(|(_, handle)| *handle)
    }

    /// Info for `subscription` if `slot` still holds it.
    #[must_use]
    pub fn holding(&self, slot: usize, subscription: SubscriptionId) -> Option<&SubscriptionInfo> {
        self.info(slot).filter(|info| info.id == subscription)
    }

    /// Record a subscription and its bundle. Returns the previous handle,
    /// which the caller must already have torn down or tear down now.
    pub fn assign(
        &mut self,
        slot: usize,
        info: SubscriptionInfo,
        handle: ListenerHandle,
    ) -> Option<ListenerHandle> {
        let entry = self.slots.get_mut(slot)?;
        entry
            .held
            .replace((info, handle))
            .map(|(_, previous)| previous)
    }

    /// Empty a slot, returning its handle.
    pub fn clear(&mut self, slot: usize) -> Option<ListenerHandle> {
        self.slots
            .get_mut(slot)?
            .held
            .take()
            .map(|(_, handle)| handle)
    }

    /// Empty every slot, returning the handles to unregister.
    pub fn clear_all(&mut self) -> Vec<ListenerHandle> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.held.take().map(|(_, handle)| handle))
            .collect()
    }

    /// Copy of the current slot to subscription mapping.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<usize, SubscriptionInfo> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.held.as_ref().map(|(info, _)| (i, info.clone())))
            .collect()
    }
}
