//! # ConcurrentEntriesMap
//!
//! Fans every key operation out to exactly one [`MapSegment`] and keeps an
//! aggregate, process-visible size count and destroy-tracker count (spec
//! §4.1).

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use ahash::AHasher;
use hashbrown::HashMap;

use region_cache_common::RegionResult;

use crate::delta::Delta;
use crate::entry::{EntryFactory, EntryState};
use crate::primes::next_prime;
use crate::region::remote::PersistenceManager;
use crate::segment::{MapSegment, PutOutcome};
use crate::version::VersionTag;

pub struct ConcurrentEntriesMap<K, V> {
    segments: Vec<MapSegment<K, V>>,
    concurrency: u32,
    size: AtomicU64,
    active_destroy_trackers: AtomicI64,
}

impl<K, V> ConcurrentEntriesMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// `concurrency_hint` is the configured concurrency level;
    /// `segment_initial_capacity` sizes each segment's hash table. Segment
    /// count is `nextPrime(concurrency_hint)`, bounded by `primes::MAX_PRIME`
    /// (spec §4.1 `segmentFor`).
    pub fn new(
        concurrency_hint: u32,
        segment_initial_capacity: u32,
        concurrency_checks_enabled: bool,
        entry_factory: EntryFactory,
    ) -> Self {
        let concurrency = next_prime(concurrency_hint);
        let mut segments = Vec::with_capacity(concurrency as usize);
        for _ in 0..concurrency {
            segments.push(MapSegment::open(
                segment_initial_capacity,
                concurrency_checks_enabled,
                entry_factory,
            ));
        }
        ConcurrentEntriesMap {
            segments,
            concurrency,
            size: AtomicU64::new(0),
            active_destroy_trackers: AtomicI64::new(0),
        }
    }

    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    fn hash_key(&self, key: &K) -> u64 {
        let mut hasher = AHasher::default();
        key.hash(&mut hasher);
        hasher.finish()
    }

    pub fn segment_for(&self, key: &K) -> &MapSegment<K, V> {
        let idx = (self.hash_key(key) as usize) % self.segments.len();
        &self.segments[idx]
    }

    pub fn get(&self, key: &K) -> Option<std::sync::Arc<EntryState<K, V>>> {
        self.segment_for(key).get(key)
    }

    /// Plain-value convenience wrapper over [`Self::get`] for callers that
    /// only want the value, not the entry handle. A non-`Value` sentinel
    /// (invalid, tombstone, destroyed) reads as absent.
    pub fn get_value(&self, key: &K) -> Option<V> {
        self.get(key).and_then(|entry| entry.value().as_plain().cloned())
    }

    pub fn create(&self, key: K, value: V, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        self.segment_for(&key).create(key, value, version_tag)?;
        self.size.fetch_add(1, Ordering::AcqRel);
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
        persistence: Option<&dyn PersistenceManager<K, V>>,
    ) -> RegionResult<PutOutcome<V>> {
        let outcome = self.segment_for(&key).put(
            key,
            value,
            version_tag,
            delta,
            clone_on_apply,
            tracked_update_count,
            persistence,
        )?;
        if !outcome.is_update {
            self.size.fetch_add(1, Ordering::AcqRel);
        }
        Ok(outcome)
    }

    pub fn invalidate(&self, key: K, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        self.segment_for(&key).invalidate(key, version_tag)
    }

    pub fn remove(
        &self,
        key: K,
        version_tag: Option<&VersionTag>,
        tracked_update_count: Option<u32>,
        schedule_tombstone_expiry: impl FnOnce(&K) -> Option<u64>,
    ) -> RegionResult<Option<V>> {
        let segment = self.segment_for(&key);
        let previous = segment.remove(key, version_tag, tracked_update_count, schedule_tombstone_expiry)?;
        if previous.is_some() {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
        Ok(previous)
    }

    pub fn add_tracker_for_entry(&self, key: &K) -> u32 {
        self.segment_for(key).add_tracker_for_entry(key)
    }

    pub fn remove_tracker_for_entry(&self, key: &K) {
        self.segment_for(key).remove_tracker_for_entry(key)
    }

    pub fn add_tracker_for_all_entries(&self) {
        self.active_destroy_trackers.fetch_add(1, Ordering::AcqRel);
        for segment in &self.segments {
            segment.add_tracker_for_all_entries();
        }
    }

    pub fn remove_destroy_tracking(&self) {
        self.active_destroy_trackers.fetch_sub(1, Ordering::AcqRel);
        for segment in &self.segments {
            segment.remove_destroy_tracking();
        }
    }

    pub fn has_active_destroy_trackers(&self) -> bool {
        self.active_destroy_trackers.load(Ordering::Acquire) > 0
    }

    /// Snapshot of every plain (non-sentinel) value across all segments.
    /// May be stale by the time the caller reads it (spec §4.1).
    pub fn get_values(&self) -> Vec<(K, V)> {
        self.segments
            .iter()
            .flat_map(|segment| segment.iter_values_snapshot())
            .collect()
    }

    pub fn reap_tombstones_by_version(&self, gc_versions: &HashMap<u16, u64>) {
        for segment in &self.segments {
            segment.reap_tombstones_by_version(gc_versions);
        }
    }

    pub fn reap_tombstones_keys(&self, keys: &[K]) {
        for segment in &self.segments {
            segment.reap_tombstones_keys(keys);
        }
    }

    pub fn segments(&self) -> &[MapSegment<K, V>] {
        &self.segments
    }

    /// Called by an entry's `cleanup` / tombstone erase path and by LRU
    /// eviction when a real (non-tombstone) value is destroyed out of
    /// band, keeping the aggregate size counter correct without routing
    /// every internal destroy back through `remove`.
    pub fn note_real_entry_removed(&self) {
        self.size.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn evict_remove(&self, key: &K) {
        if self.segment_for(key).evict_remove(key) {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
    }

    pub fn evict_invalidate(&self, key: &K) {
        self.segment_for(key).evict_invalidate(key);
    }

    pub fn evict_overflow(&self, key: &K, info: crate::region::remote::PersistenceInfo) {
        self.segment_for(key).evict_overflow(key, info);
    }
}

impl<K, V> crate::storage::EntryStorage<K, V> for ConcurrentEntriesMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> RegionResult<Option<V>> {
        Ok(self.get_value(key))
    }

    fn get_entry(&self, key: &K) -> Option<std::sync::Arc<EntryState<K, V>>> {
        ConcurrentEntriesMap::get(self, key)
    }

    fn create(&self, key: K, value: V, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        ConcurrentEntriesMap::create(self, key, value, version_tag)
    }

    fn put(
        &self,
        key: K,
        value: V,
        version_tag: Option<&VersionTag>,
        delta: Option<&dyn Delta<V>>,
        clone_on_apply: bool,
        tracked_update_count: Option<u32>,
    ) -> RegionResult<PutOutcome<V>> {
        ConcurrentEntriesMap::put(
            self,
            key,
            value,
            version_tag,
            delta,
            clone_on_apply,
            tracked_update_count,
            None,
        )
    }

    fn invalidate(&self, key: K, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        ConcurrentEntriesMap::invalidate(self, key, version_tag)
    }

    fn remove(
        &self,
        key: K,
        version_tag: Option<&VersionTag>,
        tracked_update_count: Option<u32>,
        schedule_tombstone_expiry: &dyn Fn(&K) -> Option<u64>,
    ) -> RegionResult<Option<V>> {
        ConcurrentEntriesMap::remove(self, key, version_tag, tracked_update_count, schedule_tombstone_expiry)
    }

    fn size(&self) -> u64 {
        ConcurrentEntriesMap::size(self)
    }

    fn add_tracker_for_entry(&self, key: &K) -> u32 {
        ConcurrentEntriesMap::add_tracker_for_entry(self, key)
    }

    fn remove_tracker_for_entry(&self, key: &K) {
        ConcurrentEntriesMap::remove_tracker_for_entry(self, key)
    }

    fn get_values(&self) -> Vec<(K, V)> {
        ConcurrentEntriesMap::get_values(self)
    }
}
