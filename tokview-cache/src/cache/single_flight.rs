//! Per-key refresh coalescing
//!
//! Concurrent misses on one key queue behind a single async mutex so only
//! the first caller goes upstream. The leader leaves its outcome in the
//! lock's slot, and callers that waited take that outcome instead of
//! fetching again. Lock entries are held weakly and pruned once no caller
//! holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot<T> = AsyncMutex<Option<T>>;

/// Registry of in-flight refreshes keyed by cache key
pub struct SingleFlight<T> {
    slots: Mutex<HashMap<String, Weak<Slot<T>>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

/// Held for the duration of one refresh
pub struct FlightGuard<T> {
    slot: OwnedMutexGuard<Option<T>>,
    waited: bool,
}

impl<T: Clone> FlightGuard<T> {
    /// True if another refresh of the same key finished while this caller waited
    pub fn waited(&self) -> bool {
        self.waited
    }

    /// Outcome of the refresh this caller waited on, if it completed
    pub fn shared(&self) -> Option<T> {
        if self.waited {
            self.slot.clone()
        } else {
            None
        }
    }

    /// Publish this refresh's outcome to the callers queued behind it
    pub fn complete(&mut self, outcome: &T) {
        *self.slot = Some(outcome.clone());
    }
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the refresh lock for `key`
    pub async fn acquire(&self, key: &str) -> FlightGuard<T> {
        let slot = self.slot_for(key);

        match slot.clone().try_lock_owned() {
            Ok(mut guard) => {
                // A new flight starts clean; older outcomes belong to finished callers
                *guard = None;
                FlightGuard {
                    slot: guard,
                    waited: false,
                }
            }
            Err(_) => FlightGuard {
                slot: slot.lock_owned().await,
                waited: true,
            },
        }
    }

    fn slot_for(&self, key: &str) -> Arc<Slot<T>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|_, slot| slot.strong_count() > 0);

        if let Some(slot) = slots.get(key).and_then(Weak::upgrade) {
            return slot;
        }

        let slot = Arc::new(AsyncMutex::new(None));
        slots.insert(key.to_string(), Arc::downgrade(&slot));
        slot
    }
}
