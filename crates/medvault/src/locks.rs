//! Per-record lock table.
//!
//! All mutating operations against the same record id are serialized through
//! one exclusive async lock, acquired at saga start and released on every
//! exit path by the guard's Drop. The table is the only shared mutable
//! process-wide state in the core; entries are removed once their lock has
//! no holder or waiter left, so it never grows unbounded in a long-lived
//! process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use medvault_core::RecordId;

type SlotMap = HashMap<RecordId, Arc<AsyncMutex<()>>>;

/// Table of per-record exclusive locks.
#[derive(Clone)]
pub struct LockTable {
    slots: Arc<Mutex<SlotMap>>,
}

impl LockTable {
    /// Create an empty table. One per process, at startup.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Acquire the lock for a record, waiting if it is held.
    pub async fn acquire(&self, record_id: RecordId) -> RecordGuard {
        let slot = self.slot(&record_id);
        let permit = slot.lock_owned().await;
        RecordGuard {
            slots: Arc::clone(&self.slots),
            record_id,
            permit: Some(permit),
        }
    }

    /// Acquire the lock only if it is free; `None` means contention.
    pub fn try_acquire(&self, record_id: RecordId) -> Option<RecordGuard> {
        let slot = self.slot(&record_id);
        let permit = slot.try_lock_owned().ok()?;
        Some(RecordGuard {
            slots: Arc::clone(&self.slots),
            record_id,
            permit: Some(permit),
        })
    }

    /// Number of live entries (held or awaited locks).
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Whether the table has no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get or create the slot for a record id.
    fn slot(&self, record_id: &RecordId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap();
        Arc::clone(
            slots
                .entry(*record_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive hold on one record's lock.
///
/// Dropping the guard releases the lock and removes the table entry when no
/// other holder or waiter remains.
pub struct RecordGuard {
    slots: Arc<Mutex<SlotMap>>,
    record_id: RecordId,
    permit: Option<OwnedMutexGuard<()>>,
}

impl RecordGuard {
    /// The record this guard protects.
    pub fn record_id(&self) -> RecordId {
        self.record_id
    }
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        // Release the lock before inspecting the slot's reference count.
        self.permit.take();

        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get(&self.record_id) {
            // Only the map's own Arc left: no holder, no waiter.
            if Arc::strong_count(slot) == 1 {
                slots.remove(&self.record_id);
            }
        }
    }
}
