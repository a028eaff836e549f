//! # EntryStorage
//!
//! The region orchestrator talks to either a plain
//! [`ConcurrentEntriesMap`](crate::map::ConcurrentEntriesMap) or an
//! LRU-composed [`LruEntriesMap`](crate::lru::LruEntriesMap) through one
//! object-safe trait, the same way the teacher's server layer dispatches
//! through a `KVEngine` trait object instead of matching on a backend enum
//! at every call site.

use std::sync::Arc;

use region_cache_common::RegionResult;

use crate::delta::Delta;
use crate::entry::EntryState;
use crate::segment::PutOutcome;
use crate::version::VersionTag;

pub trait EntryStorage<K, V>: Send + Sync {
    fn get(&self, key: &K) -> RegionResult<Option<V>>;

    /// Raw entry handle, used by callers that need the composed
    /// version/expiration/LRU properties rather than just the value (the
    /// region orchestrator's expiry-task wiring).
    fn get_entry(&self, key: &K) -> Option<Arc<EntryState<K, V>>>;

    fn create(&self, key: K, value: V, version_tag: Option<&VersionTag>) -> RegionResult<()>;

    #[allow(clippy::too_many_arguments)]
    fn put(
        &self,
        key: K,
        value: V,
        version_tag: Option<&VersionTag>,
        delta: Option<&dyn Delta<V>>,
        clone_on_apply: bool,
        tracked_update_count: Option<u32>,
    ) -> RegionResult<PutOutcome<V>>;

    fn invalidate(&self, key: K, version_tag: Option<&VersionTag>) -> RegionResult<()>;

    fn remove(
        &self,
        key: K,
        version_tag: Option<&VersionTag>,
        tracked_update_count: Option<u32>,
        schedule_tombstone_expiry: &dyn Fn(&K) -> Option<u64>,
    ) -> RegionResult<Option<V>>;

    fn size(&self) -> u64;

    fn add_tracker_for_entry(&self, key: &K) -> u32;
    fn remove_tracker_for_entry(&self, key: &K);

    fn get_values(&self) -> Vec<(K, V)>;
}
