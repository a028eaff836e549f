//! # Cache Listener / Writer / Loader
//!
//! The remaining external collaborators from spec §6: the notification
//! sink, the pre-mutation veto hook, and the on-miss value source.

use region_cache_common::{EventFlags, RegionResult};

/// Snapshot handed to listener/writer callbacks for a single-entry
/// operation.
#[derive(Debug, Clone)]
pub struct EntryEvent<K, V> {
    pub key: K,
    pub old_value: Option<V>,
    pub new_value: Option<V>,
    pub flags: EventFlags,
}

/// Snapshot handed to listener/writer callbacks for a whole-region
/// operation (destroy, invalidate, clear).
#[derive(Debug, Clone)]
pub struct RegionEvent {
    pub flags: EventFlags,
}

/// Notified after a mutation has already applied. Exceptions here must
/// never roll back the data change (spec §7) — the orchestrator catches
/// panics/errors from these calls and reports a listener-error status
/// without undoing anything.
pub trait CacheListener<K, V>: Send + Sync {
    fn after_create(&self, _event: &EntryEvent<K, V>) {}
    fn after_update(&self, _event: &EntryEvent<K, V>) {}
    fn after_destroy(&self, _event: &EntryEvent<K, V>) {}
    fn after_invalidate(&self, _event: &EntryEvent<K, V>) {}
    fn after_region_destroy(&self, _event: &RegionEvent) {}
    fn after_region_invalidate(&self, _event: &RegionEvent) {}
    fn after_region_clear(&self, _event: &RegionEvent) {}
    fn after_region_disconnected(&self) {}
    fn close(&self) {}
}

/// Consulted before a mutation applies. Returning `false` vetoes the
/// operation — except for cache-close and notification/eviction/expiration
/// events, which spec §7 says must never honor a veto.
pub trait CacheWriter<K, V>: Send + Sync {
    fn before_create(&self, event: &EntryEvent<K, V>) -> bool {
        let _ = event;
        true
    }
    fn before_update(&self, event: &EntryEvent<K, V>) -> bool {
        let _ = event;
        true
    }
    fn before_destroy(&self, event: &EntryEvent<K, V>) -> bool {
        let _ = event;
        true
    }
    fn before_region_destroy(&self, event: &RegionEvent) -> bool {
        let _ = event;
        true
    }
    fn before_region_clear(&self, event: &RegionEvent) -> bool {
        let _ = event;
        true
    }
}

/// Supplies a value on a `get` miss when caching-on-read is in play.
pub trait CacheLoader<K, V>: Send + Sync {
    fn load(&self, key: &K) -> RegionResult<V>;
}
