//! The approximate-LRU list itself: a single lock-protected queue walked
//! CLOCK-style (spec §4.4).
//!
//! Entries are never removed from the middle. `get` sets `recentlyUsed`;
//! the eviction scan walks from the head, discarding already-evicted
//! entries, giving `recentlyUsed` entries a second chance by clearing the
//! flag and re-appending them to the tail, and treating the first entry
//! that is neither as the victim. This matches the source's `LRUList`
//! (a CLOCK/second-chance approximation), grounded directly in its header.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::entry::EntryState;

/// Caps a single eviction scan so a pathological list (e.g. every entry
/// freshly touched) cannot spin forever; the caller's `mustEvict` loop
/// will simply try again on the next insert/read.
const MAX_SCAN: usize = 1_000_000;

pub struct LruList<K, V> {
    queue: Mutex<VecDeque<Arc<EntryState<K, V>>>>,
    valid_count: AtomicU64,
}

impl<K, V> LruList<K, V> {
    pub fn new() -> Self {
        LruList {
            queue: Mutex::new(VecDeque::new()),
            valid_count: AtomicU64::new(0),
        }
    }

    pub fn valid_count(&self) -> u64 {
        self.valid_count.load(Ordering::Acquire)
    }

    /// Appends an entry that now holds a plain, in-memory value.
    pub fn push_back(&self, entry: Arc<EntryState<K, V>>) {
        self.queue.lock().push_back(entry);
        self.valid_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Runs one CLOCK scan and returns the chosen victim, already popped
    /// out of the list and accounted for in `valid_count`. Returns `None`
    /// if the list held nothing but already-evicted entries within the
    /// scan cap.
    pub fn next_victim(&self) -> Option<Arc<EntryState<K, V>>> {
        let mut queue = self.queue.lock();
        for _ in 0..MAX_SCAN {
            let candidate = queue.pop_front()?;
            let lru = match candidate.lru() {
                Some(lru) => lru,
                None => continue,
            };
            if lru.is_evicted() {
                continue;
            }
            if lru.take_recently_used() {
                queue.push_back(candidate);
                continue;
            }
            self.valid_count.fetch_sub(1, Ordering::AcqRel);
            return Some(candidate);
        }
        None
    }
}

impl<K, V> Default for LruList<K, V> {
    fn default() -> Self {
        LruList::new()
    }
}
