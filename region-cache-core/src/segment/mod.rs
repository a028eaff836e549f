//! # MapSegment
//!
//! The single synchronization domain for a slice of keys: a hash map of
//! entries, a tombstone list, and the write/version/tombstone algorithm of
//! spec §4.2. `ConcurrentEntriesMap` (in `crate::map`) fans every key
//! operation out to exactly one segment via a hash of the key.

mod tombstone;

pub use tombstone::{TombstoneEntry, TombstoneList};

use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use region_cache_common::{RegionError, RegionResult};

use crate::delta::Delta;
use crate::entry::{EntryFactory, EntryState};
use crate::primes::next_prime;
use crate::region::remote::{PersistenceInfo, PersistenceManager};
use crate::value::StoredValue;
use crate::version::{process_version_tag, ConflictOutcome, VersionStamp, VersionTag};

/// Rehash trigger: once live entries exceed this fraction of the table's
/// prime capacity, the next prime is chosen and `rehash_count` bumped
/// (spec §4.2, open/close).
const LOAD_FACTOR: f64 = 0.75;

/// Result of a `put`: whether this was a true insert vs. an update of an
/// existing plain value, and the value that was displaced (if any).
#[derive(Debug, Clone)]
pub struct PutOutcome<V> {
    pub is_update: bool,
    pub previous: Option<V>,
}

struct SegmentInner<K, V> {
    entries: HashMap<K, Arc<EntryState<K, V>>, ahash::RandomState>,
    tombstones: TombstoneList<K, V>,
    capacity: u32,
    rehash_count: u64,
}

pub struct MapSegment<K, V> {
    inner: Mutex<SegmentInner<K, V>>,
    factory: EntryFactory,
    concurrency_checks_enabled: bool,
}

impl<K, V> MapSegment<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn open(initial_capacity: u32, concurrency_checks_enabled: bool, factory: EntryFactory) -> Self {
        let capacity = next_prime(initial_capacity);
        MapSegment {
            inner: Mutex::new(SegmentInner {
                entries: HashMap::with_capacity_and_hasher(capacity as usize, ahash::RandomState::new()),
                tombstones: TombstoneList::new(),
                capacity,
                rehash_count: 0,
            }),
            factory,
            concurrency_checks_enabled,
        }
    }

    pub fn rehash_count(&self) -> u64 {
        self.inner.lock().rehash_count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn maybe_rehash(inner: &mut SegmentInner<K, V>) {
        if (inner.entries.len() as f64) <= (inner.capacity as f64) * LOAD_FACTOR {
            return;
        }
        inner.capacity = next_prime(inner.capacity + 1);
        inner.entries.reserve(inner.capacity as usize - inner.entries.len());
        inner.rehash_count += 1;
    }

    pub fn get(&self, key: &K) -> Option<Arc<EntryState<K, V>>> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// spec §4.2.1 `create`.
    pub fn create(&self, key: K, value: V, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get(&key).cloned() {
            let mut guard = entry.value();
            match &*guard {
                StoredValue::Value(_) | StoredValue::Overflowed => return Err(RegionError::EntryExists),
                StoredValue::Tombstone if self.concurrency_checks_enabled => {
                    let stamp = *entry.expect_version().lock();
                    let tag = version_tag.copied().unwrap_or_default();
                    match process_version_tag(stamp, &tag, false) {
                        ConflictOutcome::Accept(new_stamp) => {
                            *entry.expect_version().lock() = new_stamp;
                            *guard = StoredValue::Value(value);
                            drop(guard);
                            inner.tombstones.remove(&key);
                            return Ok(());
                        }
                        ConflictOutcome::Reject => return Err(RegionError::ConcurrentModification),
                        ConflictOutcome::InvalidDelta => return Err(RegionError::InvalidDelta),
                    }
                }
                StoredValue::Tombstone | StoredValue::Invalid | StoredValue::Destroyed => {
                    // nullptr-like placeholder (tracker bootstrap, or
                    // tombstone with checks disabled): convert in place.
                    if self.concurrency_checks_enabled {
                        if let Some(tag) = version_tag {
                            *entry.expect_version().lock() = VersionStamp {
                                entry_version: tag.entry_version,
                                region_version: tag.region_version,
                                member_id: tag.member_id,
                            };
                        }
                    }
                    *guard = StoredValue::Value(value);
                    return Ok(());
                }
            }
        }

        let entry = self.factory.create(key.clone(), StoredValue::Value(value));
        if self.concurrency_checks_enabled {
            if let Some(tag) = version_tag {
                *entry.expect_version().lock() = VersionStamp {
                    entry_version: tag.entry_version,
                    region_version: tag.region_version,
                    member_id: tag.member_id,
                };
            }
        }
        inner.entries.insert(key, Arc::new(entry));
        Self::maybe_rehash(&mut inner);
        Ok(())
    }

    /// spec §4.2.2 `put` / `putForTrackedEntry`.
    #[allow(clippy::too_many_arguments)]
    pub fn put(
        &self,
        key: K,
        new_value: V,
        version_tag: Option<&VersionTag>,
        delta: Option<&dyn Delta<V>>,
        clone_on_apply: bool,
        tracked_update_count: Option<u32>,
        persistence: Option<&dyn PersistenceManager<K, V>>,
    ) -> RegionResult<PutOutcome<V>> {
        let mut inner = self.inner.lock();

        let entry = match inner.entries.get(&key).cloned() {
            None => {
                if delta.is_some() {
                    return Err(RegionError::InvalidDelta);
                }
                let entry = self.factory.create(key.clone(), StoredValue::Value(new_value));
                if self.concurrency_checks_enabled {
                    if let Some(tag) = version_tag {
                        *entry.expect_version().lock() = VersionStamp {
                            entry_version: tag.entry_version,
                            region_version: tag.region_version,
                            member_id: tag.member_id,
                        };
                    }
                }
                inner.entries.insert(key, Arc::new(entry));
                Self::maybe_rehash(&mut inner);
                return Ok(PutOutcome {
                    is_update: false,
                    previous: None,
                });
            }
            Some(entry) => entry,
        };

        if self.concurrency_checks_enabled {
            let stamp = *entry.expect_version().lock();
            let tag = version_tag.copied().unwrap_or_default();
            match process_version_tag(stamp, &tag, delta.is_some()) {
                ConflictOutcome::Accept(new_stamp) => *entry.expect_version().lock() = new_stamp,
                ConflictOutcome::Reject => return Err(RegionError::ConcurrentModification),
                ConflictOutcome::InvalidDelta => return Err(RegionError::InvalidDelta),
            }
        }

        let mut guard = entry.value();
        if guard.is_tombstone() {
            drop(guard);
            inner.tombstones.remove(&key);
            let fresh = self.factory.create(key.clone(), StoredValue::Value(new_value));
            if self.concurrency_checks_enabled {
                *fresh.expect_version().lock() = *entry.expect_version().lock();
            }
            inner.entries.insert(key, Arc::new(fresh));
            return Ok(PutOutcome {
                is_update: false,
                previous: None,
            });
        }

        let apply_unconditionally = self.concurrency_checks_enabled || tracked_update_count.is_none();
        if !apply_unconditionally {
            let snapshot = tracked_update_count.unwrap();
            if entry.tracker().update_count() != snapshot {
                return Err(RegionError::EntryUpdated);
            }
        }

        let previous = guard.as_plain().cloned();
        apply_value_or_delta(&entry, &mut guard, new_value, delta, clone_on_apply, &key, persistence)?;
        drop(guard);

        if !apply_unconditionally {
            entry.tracker().remove_tracker();
        }
        entry.tracker().increment_update_count();
        inner.tombstones.remove(&key);

        Ok(PutOutcome {
            is_update: true,
            previous,
        })
    }

    /// spec §4.2.3 `invalidate`.
    pub fn invalidate(&self, key: K, version_tag: Option<&VersionTag>) -> RegionResult<()> {
        let mut inner = self.inner.lock();
        match inner.entries.get(&key).cloned() {
            Some(entry) => {
                let mut guard = entry.value();
                if guard.is_tombstone() {
                    return Err(RegionError::EntryNotFound);
                }
                if self.concurrency_checks_enabled {
                    let stamp = *entry.expect_version().lock();
                    let tag = version_tag.copied().unwrap_or_default();
                    match process_version_tag(stamp, &tag, false) {
                        ConflictOutcome::Accept(new_stamp) => *entry.expect_version().lock() = new_stamp,
                        ConflictOutcome::Reject => return Err(RegionError::ConcurrentModification),
                        ConflictOutcome::InvalidDelta => return Err(RegionError::InvalidDelta),
                    }
                }
                *guard = StoredValue::Invalid;
                drop(guard);
                entry.tracker().increment_update_count();
                Ok(())
            }
            None => {
                if self.concurrency_checks_enabled {
                    let entry = self.factory.create(key.clone(), StoredValue::Invalid);
                    if let Some(tag) = version_tag {
                        *entry.expect_version().lock() = VersionStamp {
                            entry_version: tag.entry_version,
                            region_version: tag.region_version,
                            member_id: tag.member_id,
                        };
                    }
                    inner.entries.insert(key, Arc::new(entry));
                    Ok(())
                } else {
                    Err(RegionError::EntryNotFound)
                }
            }
        }
    }

    /// spec §4.2.4 `remove`.
    pub fn remove(
        &self,
        key: K,
        version_tag: Option<&VersionTag>,
        tracked_update_count: Option<u32>,
        schedule_tombstone_expiry: impl FnOnce(&K) -> Option<u64>,
    ) -> RegionResult<Option<V>> {
        let mut inner = self.inner.lock();
        let entry = match inner.entries.get(&key).cloned() {
            Some(entry) => entry,
            None => {
                return if self.concurrency_checks_enabled {
                    if let Some(tag) = version_tag {
                        let placeholder = self.factory.create(key.clone(), StoredValue::Tombstone);
                        *placeholder.expect_version().lock() = VersionStamp {
                            entry_version: tag.entry_version,
                            region_version: tag.region_version,
                            member_id: tag.member_id,
                        };
                        let placeholder = Arc::new(placeholder);
                        inner.entries.insert(key.clone(), placeholder.clone());
                        let task_id = schedule_tombstone_expiry(&key);
                        inner.tombstones.insert(key, placeholder, task_id);
                    }
                    Ok(None)
                } else {
                    Err(RegionError::EntryNotFound)
                };
            }
        };

        if let Some(snapshot) = tracked_update_count {
            if entry.tracker().update_count() != snapshot {
                return Err(RegionError::EntryUpdated);
            }
        }

        if self.concurrency_checks_enabled {
            let stamp = *entry.expect_version().lock();
            let tag = version_tag.copied().unwrap_or_default();
            match process_version_tag(stamp, &tag, false) {
                ConflictOutcome::Accept(new_stamp) => *entry.expect_version().lock() = new_stamp,
                ConflictOutcome::Reject => return Err(RegionError::ConcurrentModification),
                ConflictOutcome::InvalidDelta => return Err(RegionError::InvalidDelta),
            }
            let mut guard = entry.value();
            let previous = guard.as_plain().cloned();
            *guard = StoredValue::Tombstone;
            drop(guard);
            let task_id = schedule_tombstone_expiry(&key);
            inner.tombstones.insert(key.clone(), entry.clone(), task_id);
            Ok(previous)
        } else {
            let mut guard = entry.value();
            let previous = guard.as_plain().cloned();
            *guard = StoredValue::Destroyed;
            drop(guard);
            inner.entries.remove(&key);
            Ok(previous)
        }
    }

    pub fn add_tracker_for_entry(&self, key: &K) -> u32 {
        let mut inner = self.inner.lock();
        let entry = inner.entries.entry(key.clone()).or_insert_with(|| {
            Arc::new(self.factory.create(key.clone(), StoredValue::Destroyed))
        });
        entry.tracker().add_tracker()
    }

    pub fn remove_tracker_for_entry(&self, key: &K) {
        if let Some(entry) = self.inner.lock().entries.get(key) {
            entry.tracker().remove_tracker();
        }
    }

    pub fn add_tracker_for_all_entries(&self) {
        let inner = self.inner.lock();
        for entry in inner.entries.values() {
            entry.tracker().add_tracker();
        }
    }

    pub fn remove_destroy_tracking(&self) {
        let inner = self.inner.lock();
        for entry in inner.entries.values() {
            entry.tracker().remove_tracker();
        }
    }

    /// spec §4.2.6, reap by member gc-version threshold.
    pub fn reap_tombstones_by_version(&self, gc_versions: &HashMap<u16, u64>) {
        let mut inner = self.inner.lock();
        let keys_to_drop = inner.tombstones.keys_below_gc_threshold(gc_versions);
        for key in keys_to_drop {
            inner.tombstones.remove(&key);
            inner.entries.remove(&key);
        }
    }

    /// spec §4.2.6, unconditional reap by key list.
    pub fn reap_tombstones_keys(&self, keys: &[K]) {
        let mut inner = self.inner.lock();
        inner.tombstones.reap_keys(keys);
        for key in keys {
            inner.entries.remove(key);
        }
    }

    /// spec §4.2.6 `remove_tomb_entry`, invoked by a firing
    /// `TombstoneExpiryTask`. Guarded against the tombstone having already
    /// been invalidated by a competing reap or re-create.
    pub fn remove_tomb_entry(&self, key: &K) {
        let mut inner = self.inner.lock();
        if let Some(tomb) = inner.tombstones.get(key) {
            if !tomb.entry.value().is_tombstone() {
                return;
            }
        } else {
            return;
        }
        inner.tombstones.remove(key);
        inner.entries.remove(key);
    }

    /// Unconditional local removal used by LRU eviction (spec §4.4). Not a
    /// versioned write: the conflict algorithm never runs.
    pub fn evict_remove(&self, key: &K) -> bool {
        self.inner.lock().entries.remove(key).is_some()
    }

    /// Unconditional local invalidate used by LRU eviction.
    pub fn evict_invalidate(&self, key: &K) {
        if let Some(entry) = self.inner.lock().entries.get(key) {
            *entry.value() = StoredValue::Invalid;
        }
    }

    /// Replaces a plain value with the `OVERFLOWED` sentinel and records
    /// where the persistence manager wrote it, used by LRU eviction's
    /// `OVERFLOW_TO_DISK` action.
    pub fn evict_overflow(&self, key: &K, info: PersistenceInfo) {
        if let Some(entry) = self.inner.lock().entries.get(key) {
            *entry.value() = StoredValue::Overflowed;
            if let Some(lru) = entry.lru() {
                lru.set_persistence_info(Some(info));
                lru.mark_evicted();
            }
        }
    }

    pub fn iter_values_snapshot(&self) -> Vec<(K, V)>
    where
        K: Clone,
    {
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .filter_map(|(k, e)| e.value().as_plain().cloned().map(|v| (k.clone(), v)))
            .collect()
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_value_or_delta<K, V: Clone>(
    entry: &Arc<EntryState<K, V>>,
    guard: &mut StoredValue<V>,
    new_value: V,
    delta: Option<&dyn Delta<V>>,
    clone_on_apply: bool,
    key: &K,
    persistence: Option<&dyn PersistenceManager<K, V>>,
) -> RegionResult<()> {
    match delta {
        None => {
            *guard = StoredValue::Value(new_value);
            Ok(())
        }
        Some(d) => match guard {
            StoredValue::Value(v) => {
                if clone_on_apply {
                    let mut cloned = v.clone();
                    d.apply(&mut cloned).map_err(|_| RegionError::InvalidDelta)?;
                    *v = cloned;
                } else {
                    d.apply(v).map_err(|_| RegionError::InvalidDelta)?;
                }
                Ok(())
            }
            StoredValue::Overflowed => {
                let pm = persistence.ok_or_else(|| {
                    RegionError::state("delta against overflowed entry needs a persistence manager")
                })?;
                let info: PersistenceInfo = entry
                    .lru()
                    .and_then(|lru| lru.persistence_info())
                    .ok_or_else(|| RegionError::state("overflowed entry missing its persistence handle"))?;
                let mut restored = pm.read(key, info)?;
                d.apply(&mut restored).map_err(|_| RegionError::InvalidDelta)?;
                *guard = StoredValue::Value(restored);
                if let Some(lru) = entry.lru() {
                    lru.set_persistence_info(None);
                }
                Ok(())
            }
            _ => Err(RegionError::InvalidDelta),
        },
    }
}
