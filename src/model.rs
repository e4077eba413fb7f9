//! Shared value-net handles for worker threads.
//!
//! The training side periodically publishes a fresh net; workers in the
//! middle of a solve keep using whatever handle they already hold. Each slot
//! holds an `Arc<dyn ValueNet>` behind a read-write lock, so a swap is a
//! pointer replacement: readers never see a half-updated model and never
//! block each other.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::cfr::value::ValueNet;

/// A set of hot-swappable value-net slots.
///
/// Multiple slots allow spreading workers across model replicas (e.g. one
/// per accelerator); a single-slot locker is the common case.
pub struct ModelLocker {
    slots: Vec<RwLock<Arc<dyn ValueNet>>>,
}

impl ModelLocker {
    /// Create a locker with one slot per provided net.
    pub fn new(nets: Vec<Arc<dyn ValueNet>>) -> Self {
        assert!(!nets.is_empty(), "model locker needs at least one slot");
        Self {
            slots: nets.into_iter().map(RwLock::new).collect(),
        }
    }

    /// Single-slot locker.
    pub fn single(net: Arc<dyn ValueNet>) -> Self {
        Self::new(vec![net])
    }

    /// Number of slots.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Clone out the current net for `slot`. The returned handle stays valid
    /// across any number of subsequent updates.
    pub fn acquire(&self, slot: usize) -> Arc<dyn ValueNet> {
        Arc::clone(&self.slots[slot % self.slots.len()].read())
    }

    /// Publish a new net into one slot.
    pub fn update_slot(&self, slot: usize, net: Arc<dyn ValueNet>) {
        *self.slots[slot % self.slots.len()].write() = net;
        log::debug!("model slot {} updated", slot % self.slots.len());
    }

    /// Publish the same net into every slot.
    pub fn update(&self, net: Arc<dyn ValueNet>) {
        for slot in &self.slots {
            *slot.write() = Arc::clone(&net);
        }
    }
}
