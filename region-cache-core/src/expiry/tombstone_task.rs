//! `TombstoneExpiryTask` (spec §4.7, §4.2.6): single-shot reap of one
//! tombstoned key from its owning segment.

use std::hash::Hash;
use std::sync::Arc;

use crate::map::ConcurrentEntriesMap;

use super::task::ExpiryTask;

pub struct TombstoneExpiryTask<K, V> {
    map: Arc<ConcurrentEntriesMap<K, V>>,
    key: K,
}

impl<K, V> TombstoneExpiryTask<K, V> {
    pub fn new(map: Arc<ConcurrentEntriesMap<K, V>>, key: K) -> Self {
        TombstoneExpiryTask { map, key }
    }
}

impl<K, V> ExpiryTask for TombstoneExpiryTask<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn on_expire(&self) -> bool {
        // remove_tomb_entry is itself guarded against a competing reap or
        // re-create having already invalidated this tombstone.
        self.map.segment_for(&self.key).remove_tomb_entry(&self.key);
        true
    }
}
