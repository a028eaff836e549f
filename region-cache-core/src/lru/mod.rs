//! # LRUEntriesMap
//!
//! Extends [`ConcurrentEntriesMap`](crate::map::ConcurrentEntriesMap) with
//! an approximate-LRU list and eviction enforcement (spec §4.4).

mod action;
mod list;

pub use action::LruEvictionAction;
pub use list::LruList;

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use region_cache_common::{RegionError, RegionResult};

use crate::delta::Delta;
use crate::entry::EntryFactory;
use crate::map::ConcurrentEntriesMap;
use crate::region::remote::{PersistenceInfo, PersistenceManager};
use crate::value::StoredValue;
use crate::version::VersionTag;

/// Estimates the in-memory footprint of a value for `currentMapSize`
/// (spec §4.4). Advisory only — size tracking never blocks or fails an
/// operation, so a missing estimator simply reports zero deltas.
pub type SizeEstimator<V> = Arc<dyn Fn(&V) -> i64 + Send + Sync>;

pub struct LruEntriesMap<K, V> {
    map: Arc<ConcurrentEntriesMap<K, V>>,
    list: LruList<K, V>,
    limit: AtomicU32,
    heap_mode: bool,
    action: LruEvictionAction,
    persistence: Option<Arc<dyn PersistenceManager<K, V>>>,
    current_map_size: AtomicI64,
    size_estimator: Option<SizeEstimator<V>>,
}

impl<K, V> LruEntriesMap<K, V>
where
    K: Eq + std::hash::Hash + Clone,
    V: Clone,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        concurrency_hint: u32,
        segment_initial_capacity: u32,
        concurrency_checks_enabled: bool,
        entry_factory: EntryFactory,
        limit: u32,
        heap_mode: bool,
        action: LruEvictionAction,
        persistence: Option<Arc<dyn PersistenceManager<K, V>>>,
        size_estimator: Option<SizeEstimator<V>>,
    ) -> Self {
        LruEntriesMap {
            map: Arc::new(ConcurrentEntriesMap::new(
                concurrency_hint,
                segment_initial_capacity,
                concurrency_checks_enabled,
                entry_factory,
            )),
            list: LruList::new(),
            limit: AtomicU32::new(limit),
            heap_mode,
            action,
            persistence,
            current_map_size: AtomicI64::new(0),
            size_estimator,
        }
    }

    pub fn inner(&self) -> &ConcurrentEntriesMap<K, V> {
        self.map.as_ref()
    }

    pub fn inner_arc(&self) -> Arc<ConcurrentEntriesMap<K, V>> {
        self.map.clone()
    }

    pub fn set_limit(&self, limit: u32) {
        self.limit.store(limit, Ordering::Release);
    }

    pub fn current_map_size(&self) -> i64 {
        self.current_map_size.load(Ordering::Acquire)
    }

    fn bump_size(&self, value: &V) {
        if let Some(estimator) = &self.size_estimator {
            self.current_map_size.fetch_add(estimator(value), Ordering::AcqRel);
        }
    }

    fn shrink_size(&self, value: &V) {
        if let Some(estimator) = &self.size_estimator {
            self.current_map_size.fetch_sub(estimator(value), Ordering::AcqRel);
        }
    }

    /// True when the count-based `lruLimit` is exceeded. Callers in heap
    /// mode drive eviction externally via [`Self::evict`] instead.
    pub fn must_evict(&self) -> bool {
        let limit = self.limit.load(Ordering::Acquire);
        !self.heap_mode && limit > 0 && self.list.valid_count() > limit as u64
    }

    pub fn get(&self, key: &K) -> RegionResult<Option<V>> {
        let entry = match self.map.get(key) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let mut guard = entry.value();
        match &*guard {
            StoredValue::Value(v) => {
                let v = v.clone();
                drop(guard);
                if let Some(lru) = entry.lru() {
                    lru.mark_recently_used();
                }
                if let Some(exp) = entry.exp() {
                    exp.touch_accessed();
                }
                Ok(Some(v))
            }
            StoredValue::Overflowed => {
                let pm = self
                    .persistence
                    .as_deref()
                    .ok_or_else(|| RegionError::state("overflowed entry but no persistence manager configured"))?;
                let info = entry
                    .lru()
                    .and_then(|lru| lru.persistence_info())
                    .ok_or_else(|| RegionError::state("overflowed entry missing its persistence handle"))?;
                let restored = pm.read(key, info)?;
                *guard = StoredValue::Value(restored.clone());
                drop(guard);
                if let Some(lru) = entry.lru() {
                    lru.set_persistence_info(None);
                }
                self.bump_size(&restored);
                self.list.push_back(entry.clone());
                Ok(Some(restored))
            }
            _ => Ok(None),
        }
    }

    pub fn create(&self, key: K, value: V, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        self.bump_size(&value);
        self.map.create(key.clone(), value, version_tag)?;
        if let Some(entry) = self.map.get(&key) {
            self.list.push_back(entry);
        }
        self.process_lru();
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn put(
        &self,
        key: K,
        value: V,
        version_tag: Option<&VersionTag>,
        delta: Option<&dyn Delta<V>>,
        clone_on_apply: bool,
        tracked_update_count: Option<u32>,
    ) -> RegionResult<crate::segment::PutOutcome<V>> {
        self.bump_size(&value);
        let outcome = self.map.put(
            key.clone(),
            value,
            version_tag,
            delta,
            clone_on_apply,
            tracked_update_count,
            self.persistence.as_deref(),
        )?;
        if let Some(old) = &outcome.previous {
            self.shrink_size(old);
        }
        if !outcome.is_update {
            if let Some(entry) = self.map.get(&key) {
                self.list.push_back(entry);
            }
        }
        self.process_lru();
        Ok(outcome)
    }

    pub fn invalidate(&self, key: K, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        self.map.invalidate(key, version_tag)
    }

    pub fn remove(
        &self,
        key: K,
        version_tag: Option<&VersionTag>,
        tracked_update_count: Option<u32>,
        schedule_tombstone_expiry: impl FnOnce(&K) -> Option<u64>,
    ) -> RegionResult<Option<V>> {
        let previous = self
            .map
            .remove(key, version_tag, tracked_update_count, schedule_tombstone_expiry)?;
        if let Some(old) = &previous {
            self.shrink_size(old);
        }
        Ok(previous)
    }

    /// Runs the eviction loop while the count-based limit is exceeded
    /// (spec §4.4 `processLRU`). In heap mode, callers drive eviction via
    /// [`Self::evict`] instead; this is a no-op there.
    fn process_lru(&self) {
        while self.must_evict() {
            if !self.evict_one() {
                break;
            }
        }
    }

    /// Evicts approximately `fraction` of the currently valid entries.
    /// Called by the `EvictionController` in heap mode (spec §4.8).
    pub fn evict(&self, fraction: f64) {
        let target = ((self.list.valid_count() as f64) * fraction.clamp(0.0, 1.0)).ceil() as u64;
        for _ in 0..target {
            if !self.evict_one() {
                break;
            }
        }
    }

    fn evict_one(&self) -> bool {
        let victim = match self.list.next_victim() {
            Some(v) => v,
            None => return false,
        };
        let key = victim.key().clone();
        if let Some(v) = victim.value().as_plain() {
            self.shrink_size(v);
        }
        match self.action {
            LruEvictionAction::LocalDestroy | LruEvictionAction::Destroy => {
                self.map.evict_remove(&key);
                victim.cleanup(|_task_id| {});
            }
            LruEvictionAction::LocalInvalidate => {
                self.map.evict_invalidate(&key);
            }
            LruEvictionAction::OverflowToDisk => {
                if let Some(pm) = &self.persistence {
                    let plain = victim.value().as_plain().cloned();
                    if let Some(value) = plain {
                        if let Ok(info) = pm.write(&key, &value) {
                            self.map.evict_overflow(&key, info);
                        } else {
                            return false;
                        }
                    }
                } else {
                    self.map.evict_remove(&key);
                    victim.cleanup(|_task_id| {});
                }
            }
        }
        true
    }

    pub fn size(&self) -> u64 {
        self.map.size()
    }
}

impl<K, V> crate::eviction_controller::EvictableRegion for LruEntriesMap<K, V>
where
    K: Eq + std::hash::Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn evict(&self, fraction: f64) {
        LruEntriesMap::evict(self, fraction);
    }
}

impl<K, V> crate::storage::EntryStorage<K, V> for LruEntriesMap<K, V>
where
    K: Eq + std::hash::Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> RegionResult<Option<V>> {
        LruEntriesMap::get(self, key)
    }

    fn create(&self, key: K, value: V, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        LruEntriesMap::create(self, key, value, version_tag)
    }

    fn put(
        &self,
        key: K,
        value: V,
        version_tag: Option<&VersionTag>,
        delta: Option<&dyn Delta<V>>,
        clone_on_apply: bool,
        tracked_update_count: Option<u32>,
    ) -> RegionResult<crate::segment::PutOutcome<V>> {
        LruEntriesMap::put(self, key, value, version_tag, delta, clone_on_apply, tracked_update_count)
    }

    fn invalidate(&self, key: K, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        LruEntriesMap::invalidate(self, key, version_tag)
    }

    fn remove(
        &self,
        key: K,
        version_tag: Option<&VersionTag>,
        tracked_update_count: Option<u32>,
        schedule_tombstone_expiry: &dyn Fn(&K) -> Option<u64>,
    ) -> RegionResult<Option<V>> {
        LruEntriesMap::remove(self, key, version_tag, tracked_update_count, schedule_tombstone_expiry)
    }

    fn size(&self) -> u64 {
        LruEntriesMap::size(self)
    }

    fn add_tracker_for_entry(&self, key: &K) -> u32 {
        self.map.add_tracker_for_entry(key)
    }

    fn remove_tracker_for_entry(&self, key: &K) {
        self.map.remove_tracker_for_entry(key)
    }

    fn get_values(&self) -> Vec<(K, V)> {
        self.map.get_values()
    }

    fn get_entry(&self, key: &K) -> Option<Arc<crate::entry::EntryState<K, V>>> {
        self.map.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::LruEvictionAction as Action;

    fn factory() -> EntryFactory {
        EntryFactory::new(false, false, true)
    }

    #[test]
    fn inserting_past_limit_evicts_oldest_unused() {
        let lru: LruEntriesMap<String, i32> = LruEntriesMap::new(
            4,
            4,
            false,
            factory(),
            2,
            false,
            Action::LocalDestroy,
            None,
            None,
        );
        lru.create("a".into(), 1, None).unwrap();
        lru.create("b".into(), 2, None).unwrap();
        lru.create("c".into(), 3, None).unwrap();

        // capacity 2: "a" should have been evicted as the unused victim.
        assert_eq!(lru.get(&"a".to_string()).unwrap(), None);
        assert_eq!(lru.get(&"b".to_string()).unwrap(), Some(2));
        assert_eq!(lru.get(&"c".to_string()).unwrap(), Some(3));
    }

    #[test]
    fn recently_used_entry_survives_one_scan() {
        let lru: LruEntriesMap<String, i32> = LruEntriesMap::new(
            4,
            4,
            false,
            factory(),
            2,
            false,
            Action::LocalDestroy,
            None,
            None,
        );
        lru.create("a".into(), 1, None).unwrap();
        lru.create("b".into(), 2, None).unwrap();
        // touch "a" so it gets a second chance over "b" when "c" arrives.
        lru.get(&"a".to_string()).unwrap();
        lru.create("c".into(), 3, None).unwrap();

        assert_eq!(lru.get(&"a".to_string()).unwrap(), Some(1));
        assert_eq!(lru.get(&"b".to_string()).unwrap(), None);
    }
}
