use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

use crate::types::{Topic, TopicId};

/// The last topic successfully fetched for a slot, and when that fetch finished.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub topic: Arc<Topic>,
    pub at: Instant,
}

/// The cached state of a single topic.
///
/// The contents are only reachable through [`lock`](Self::lock), which is held for the whole
/// lookup, including a fetch from the forum. Concurrent lookups of the same topic therefore
/// wait for each other instead of all hitting the forum.
#[derive(Debug, Default)]
pub struct TopicSlot {
    last: Arc<tokio::sync::Mutex<Option<Fetched>>>,
}

impl TopicSlot {
    pub async fn lock(&self) -> OwnedMutexGuard<Option<Fetched>> {
        Arc::clone(&self.last).lock_owned().await
    }
}

/// Maps topic ids to their [`TopicSlot`]s.
///
/// The map has its own lock, which is only ever taken to insert or remove a slot and never
/// while waiting on a slot or on the network.
#[derive(Debug, Default)]
pub struct TopicStore {
    slots: Mutex<HashMap<TopicId, Arc<TopicSlot>>>,
}

impl TopicStore {
    fn slots(&self) -> MutexGuard<'_, HashMap<TopicId, Arc<TopicSlot>>> {
        // A panic while holding this lock cannot leave the map half-updated.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the slot for `id`, creating an empty one if there is none yet.
    ///
    /// Concurrent callers asking for the same id all get the same slot.
    pub fn lookup_or_create(&self, id: TopicId) -> Arc<TopicSlot> {
        Arc::clone(self.slots().entry(id).or_default())
    }

    /// Removes the slot for `id`, if any.
    ///
    /// Returns `true` if a slot was removed.
    pub fn invalidate(&self, id: TopicId) -> bool {
        self.slots().remove(&id).is_some()
    }

    /// Removes the slot for `id`, but only if it still is `slot`.
    ///
    /// Returns `true` if the slot was removed. A slot that was invalidated and replaced in the
    /// meantime is left alone.
    pub fn evict(&self, id: TopicId, slot: &Arc<TopicSlot>) -> bool {
        let mut slots = self.slots();
        match slots.get(&id) {
            Some(current) if Arc::ptr_eq(current, slot) => {
                slots.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Whether `slot` is the slot currently registered for `id`.
    pub fn is_registered(&self, id: TopicId, slot: &Arc<TopicSlot>) -> bool {
        self.slots()
            .get(&id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}
