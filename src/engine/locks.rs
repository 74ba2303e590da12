use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type Slots = Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>;

/// One async mutex per entity id (trip, driver, vehicle), created on demand and
/// dropped again once nobody holds or waits for it. Unrelated keys never contend.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    slots: Slots,
}

/// Holds the lock for one key until dropped.
pub struct KeyGuard {
    key: Uuid,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: Uuid) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key).or_default().clone()
        };

        let guard = slot.clone().lock_owned().await;
        KeyGuard {
            key,
            slot,
            guard: Some(guard),
            slots: self.slots.clone(),
        }
    }

    /// Locks several keys in ascending order so overlapping callers cannot deadlock.
    pub async fn lock_many(&self, keys: impl IntoIterator<Item = Uuid>) -> Vec<KeyGuard> {
        let mut keys: Vec<Uuid> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();

        // Clones are only made under the map lock, so the count is exact here:
        // one for the map entry and one for this guard means no waiters remain.
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
