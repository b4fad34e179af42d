//! Per-(subject, purpose) serialisation of issuance.
//!
//! The rate limiter reads history and the issuer writes it; without a lock two
//! concurrent issues for one pair could both pass the cool-down. Holding the
//! pair's lock from the check through the insert makes the pair's
//! check-then-insert atomic within this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type Slot = AsyncMutex<()>;

/// Shared table of per-pair async locks. Clones share the table.
#[derive(Clone, Default)]
pub struct IssueLocks {
    slots: Arc<Mutex<HashMap<(Uuid, String), Weak<Slot>>>>,
}

impl IssueLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the pair. Released when the guard drops.
    pub async fn acquire(&self, subject_id: Uuid, purpose: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries die with their last guard or waiter.
            slots.retain(|_, slot| slot.strong_count() > 0);
            let key = (subject_id, purpose.to_owned());
            match slots.get(&key).and_then(Weak::upgrade) {
                Some(slot) => slot,
                None => {
                    let slot = Arc::new(Slot::new(()));
                    slots.insert(key, Arc::downgrade(&slot));
                    slot
                }
            }
        };
        slot.lock_owned().await
    }

    /// Number of pairs currently locked or awaited.
    #[cfg(test)]
    fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }
}
