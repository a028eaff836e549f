//! Per-entry LRU bookkeeping consumed by the CLOCK list in `crate::lru`
//! (spec §4.4).

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::region::remote::PersistenceInfo;

#[derive(Debug)]
pub struct LruProps {
    /// Set on every read or write; cleared by the CLOCK scan's "give a
    /// second chance" pass instead of moving the entry in the list.
    recently_used: AtomicBool,
    /// Set once the entry has been evicted from the list so a stale
    /// `Arc` reachable from elsewhere is recognized as gone.
    evicted: AtomicBool,
    /// Disk location for `OverflowToDisk`, populated only when the entry
    /// has actually been written out.
    persistence_info: Mutex<Option<PersistenceInfo>>,
}

impl LruProps {
    pub fn new() -> Self {
        LruProps {
            recently_used: AtomicBool::new(false),
            evicted: AtomicBool::new(false),
            persistence_info: Mutex::new(None),
        }
    }

    pub fn mark_recently_used(&self) {
        self.recently_used.store(true, Ordering::Release);
    }

    /// Clears and returns the recently-used bit (the CLOCK hand's "second
    /// chance" test).
    pub fn take_recently_used(&self) -> bool {
        self.recently_used.swap(false, Ordering::AcqRel)
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }

    pub fn mark_evicted(&self) {
        self.evicted.store(true, Ordering::Release);
    }

    pub fn persistence_info(&self) -> Option<PersistenceInfo> {
        *self.persistence_info.lock()
    }

    pub fn set_persistence_info(&self, info: Option<PersistenceInfo>) {
        *self.persistence_info.lock() = info;
    }
}

impl Default for LruProps {
    fn default() -> Self {
        LruProps::new()
    }
}
