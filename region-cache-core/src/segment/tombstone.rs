//! Per-segment tombstone bookkeeping (spec §4.2.6).
//!
//! The tombstone list is a plain map from key to the tombstoned entry plus
//! the id of the `TombstoneExpiryTask` watching it, so the expiry task can
//! be cancelled if the entry is erased some other way first (a competing
//! reap or a re-create).

use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::entry::EntryState;

pub struct TombstoneEntry<K, V> {
    pub entry: Arc<EntryState<K, V>>,
    pub task_id: Option<u64>,
}

pub struct TombstoneList<K, V> {
    entries: HashMap<K, TombstoneEntry<K, V>>,
}

impl<K, V> TombstoneList<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        TombstoneList {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, entry: Arc<EntryState<K, V>>, task_id: Option<u64>) {
        self.entries.insert(key, TombstoneEntry { entry, task_id });
    }

    pub fn get(&self, key: &K) -> Option<&TombstoneEntry<K, V>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<TombstoneEntry<K, V>> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys whose stamp's member id is present in `gc_versions` with the
    /// entry's region-version at or below the advertised threshold (spec
    /// §4.2.6, reap-by-version). Collected rather than removed in place so
    /// the caller can also drop the live entry from the segment's main map.
    pub fn keys_below_gc_threshold(&self, gc_versions: &HashMap<u16, u64>) -> Vec<K> {
        self.entries
            .iter()
            .filter_map(|(key, tomb)| {
                let stamp = *tomb.entry.expect_version().lock();
                match gc_versions.get(&stamp.member_id) {
                    Some(&threshold) if stamp.region_version <= threshold => Some(key.clone()),
                    _ => None,
                }
            })
            .collect()
    }

    /// Unconditionally removes a fixed set of keys (spec §4.2.6, reap-by-keys).
    pub fn reap_keys(&mut self, keys: &[K]) {
        for key in keys {
            self.entries.remove(key);
        }
    }
}

impl<K, V> Default for TombstoneList<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        TombstoneList::new()
    }
}
