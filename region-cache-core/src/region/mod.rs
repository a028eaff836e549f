//! # LocalRegion
//!
//! The orchestrator spec §4.9 calls "core parts only": per-event
//! writer/listener/loader dispatch wrapped around the storage and
//! conflict-resolution layers built in `segment`/`map`/`lru`, remote-call
//! sequencing, entry/region expiry wiring, and a sub-region tree.
//!
//! `LocalRegion` never implements the wire protocol, pool management, or
//! transactions itself — those are the external collaborators in
//! `region::remote`. It only sequences calls to them in the order spec §4.9
//! and §7 require.

pub mod callbacks;
pub mod remote;
mod stats;
pub mod testing;

pub use stats::RegionStats;

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex as PlMutex, RwLock};

use region_cache_common::{EventFlags, RegionError, RegionResult, RemoteStatus};

use crate::attributes::{ExpirationAction, RegionAttributes, RegionAttributesMutator};
use crate::delta::Delta;
use crate::entry::{EntryFactory, EntryState};
use crate::eviction_controller::{EvictableRegion, EvictionController};
use crate::expiry::{EntryExpiryTask, ExpiryTaskManager, RegionExpiryTask, TombstoneExpiryTask};
use crate::lru::LruEntriesMap;
use crate::map::ConcurrentEntriesMap;
use crate::storage::EntryStorage;
use crate::version::VersionTag;

use callbacks::{CacheListener, CacheLoader, CacheWriter, EntryEvent, RegionEvent};
use remote::{RemoteOp, RemoteOpKind, RemoteOpOutcome};

/// Default lifetime of a tombstone before its placeholder is reaped, absent
/// an explicit distributed garbage-collection sweep (spec §4.2.6). Matches
/// the order of magnitude of the source's `tombstone-timeout` default.
pub const DEFAULT_TOMBSTONE_TIMEOUT: Duration = Duration::from_millis(600_000);

/// Remote-call timeout bounds (spec §5 "cancellation and timeout rules").
/// A caller-supplied timeout outside this range is an argument error rather
/// than silently clamped.
pub const MIN_REMOTE_TIMEOUT: Duration = Duration::from_millis(1);
pub const MAX_REMOTE_TIMEOUT: Duration = Duration::from_secs(600);

/// Which `CacheWriter` hook and which `CacheListener` after-hook a mutation
/// dispatches through. The three single-entry operations share almost all
/// of `update_no_throw`'s pipeline but differ in exactly these two calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Create,
    Update,
    Destroy,
}

/// Selects between the two storage shapes without making every call site
/// generic over which one is in play (spec §4.4: LRU composes onto the
/// plain map rather than replacing it).
enum Backend<K, V> {
    Plain(Arc<ConcurrentEntriesMap<K, V>>),
    Lru(Arc<LruEntriesMap<K, V>>),
}

impl<K, V> Backend<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn storage(&self) -> &dyn EntryStorage<K, V> {
        match self {
            Backend::Plain(m) => m.as_ref(),
            Backend::Lru(m) => m.as_ref(),
        }
    }

    /// The plain map backing this region, shared with the LRU overlay when
    /// one is present. Tombstone expiry only ever needs to reach a segment
    /// by key, never the LRU list itself.
    fn entries_arc(&self) -> Arc<ConcurrentEntriesMap<K, V>> {
        match self {
            Backend::Plain(m) => m.clone(),
            Backend::Lru(m) => m.inner_arc(),
        }
    }

    fn get_entry(&self, key: &K) -> Option<Arc<EntryState<K, V>>> {
        self.storage().get_entry(key)
    }

    fn evictable(&self) -> Option<Arc<dyn EvictableRegion>> {
        match self {
            Backend::Plain(_) => None,
            Backend::Lru(m) => Some(m.clone() as Arc<dyn EvictableRegion>),
        }
    }

    fn size(&self) -> u64 {
        self.storage().size()
    }
}

/// Scheduled-task bookkeeping for the (at most two) region-granularity
/// expiry timers. `0` means "not scheduled".
#[derive(Default)]
struct RegionExpiryIds {
    ttl: u64,
    idle: u64,
}

pub struct LocalRegion<K, V> {
    name: String,
    full_path: String,
    attrs: RwLock<RegionAttributes<K, V>>,
    backend: Backend<K, V>,
    expiry: Arc<ExpiryTaskManager>,
    eviction_controller: Option<Arc<EvictionController>>,
    remote: Option<Arc<dyn RemoteOp<K, V>>>,
    stats: RegionStats,
    destroy_pending: AtomicBool,
    sub_regions: PlMutex<HashMap<String, Arc<LocalRegion<K, V>>>>,
    parent: Option<Weak<LocalRegion<K, V>>>,
    region_expiry: PlMutex<RegionExpiryIds>,
    self_weak: PlMutex<Weak<LocalRegion<K, V>>>,
}

impl<K, V> LocalRegion<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    fn build(
        name: impl Into<String>,
        full_path: String,
        attrs: RegionAttributes<K, V>,
        expiry: Arc<ExpiryTaskManager>,
        eviction_controller: Option<Arc<EvictionController>>,
        remote: Option<Arc<dyn RemoteOp<K, V>>>,
        parent: Option<Weak<LocalRegion<K, V>>>,
    ) -> Arc<Self> {
        let factory = EntryFactory::new(
            attrs.concurrency_checks_enabled,
            attrs.expiration_enabled(),
            attrs.lru_enabled(),
        );
        let backend = if attrs.lru_enabled() {
            Backend::Lru(Arc::new(LruEntriesMap::new(
                attrs.concurrency_level,
                attrs.initial_capacity,
                attrs.concurrency_checks_enabled,
                factory,
                attrs.lru_entries_limit(),
                attrs.heap_lru_enabled(),
                attrs.lru_eviction_action(),
                attrs.persistence_manager().cloned(),
                None,
            )))
        } else {
            Backend::Plain(Arc::new(ConcurrentEntriesMap::new(
                attrs.concurrency_level,
                attrs.initial_capacity,
                attrs.concurrency_checks_enabled,
                factory,
            )))
        };

        let region = Arc::new_cyclic(|weak_self| LocalRegion {
            name: name.into(),
            full_path,
            attrs: RwLock::new(attrs),
            backend,
            expiry,
            eviction_controller,
            remote,
            stats: RegionStats::new(),
            destroy_pending: AtomicBool::new(false),
            sub_regions: PlMutex::new(HashMap::new()),
            parent,
            region_expiry: PlMutex::new(RegionExpiryIds::default()),
            self_weak: PlMutex::new(weak_self.clone()),
        });

        if let Some(ec) = &region.eviction_controller {
            if let Some(evictable) = region.backend.evictable() {
                ec.register_region(region.full_path.clone(), evictable);
            }
        }
        region.schedule_region_expiry();
        region
    }

    /// Opens a new top-level region.
    pub fn open(
        name: impl Into<String>,
        attrs: RegionAttributes<K, V>,
        expiry: Arc<ExpiryTaskManager>,
        eviction_controller: Option<Arc<EvictionController>>,
        remote: Option<Arc<dyn RemoteOp<K, V>>>,
    ) -> Arc<Self> {
        let name = name.into();
        let full_path = format!("/{name}");
        Self::build(name, full_path, attrs, expiry, eviction_controller, remote, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn stats(&self) -> &RegionStats {
        &self.stats
    }

    pub fn size(&self) -> u64 {
        self.backend.size()
    }

    pub fn attributes_mutator(&self) -> RegionAttributesMutator<'_, K, V> {
        RegionAttributesMutator::new(&self.attrs)
    }

    fn self_arc(&self) -> Option<Arc<LocalRegion<K, V>>> {
        self.self_weak.lock().upgrade()
    }

    // ---- destroy-pending guard -------------------------------------------

    /// Spec §5: observed by every public entry operation before acquiring a
    /// segment lock. Inbound destroy/cache-close traffic bypasses this.
    fn check_not_destroying(&self) -> RegionResult<()> {
        if self.destroy_pending.load(Ordering::Acquire) {
            return Err(RegionError::state("region is being destroyed"));
        }
        Ok(())
    }

    fn validate_timeout(&self, timeout: Option<Duration>) -> RegionResult<Duration> {
        let timeout = timeout.unwrap_or(MAX_REMOTE_TIMEOUT);
        if timeout < MIN_REMOTE_TIMEOUT || timeout > MAX_REMOTE_TIMEOUT {
            return Err(RegionError::argument("remote operation timeout out of bounds"));
        }
        Ok(timeout)
    }

    // ---- writer / listener dispatch --------------------------------------

    fn consult_writer(&self, kind: WriteKind, event: &EntryEvent<K, V>) -> RegionResult<()> {
        if event.flags.writer_veto_exempt() {
            return Ok(());
        }
        let attrs = self.attrs.read();
        let Some(writer) = attrs.writer().cloned() else {
            return Ok(());
        };
        drop(attrs);
        let allowed = match kind {
            WriteKind::Create => writer.before_create(event),
            WriteKind::Update => writer.before_update(event),
            WriteKind::Destroy => writer.before_destroy(event),
        };
        if allowed {
            Ok(())
        } else {
            Err(RegionError::WriterVeto)
        }
    }

    fn notify_listener(&self, kind: WriteKind, event: &EntryEvent<K, V>) -> RegionResult<()> {
        let attrs = self.attrs.read();
        let Some(listener) = attrs.listener().cloned() else {
            return Ok(());
        };
        drop(attrs);
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| match kind {
            WriteKind::Create => listener.after_create(event),
            WriteKind::Update => listener.after_update(event),
            WriteKind::Destroy => {
                if event.new_value.is_none() && event.flags.contains(EventFlags::NORMAL) {
                    listener.after_destroy(event)
                } else {
                    listener.after_invalidate(event)
                }
            }
        }));
        result.map_err(|_| RegionError::ListenerFailure(format!("listener panicked during {kind:?}")))
    }

    // ---- remote dispatch ---------------------------------------------------

    fn do_remote(
        &self,
        kind: RemoteOpKind,
        key: &K,
        value: Option<&V>,
        timeout: Duration,
    ) -> RegionResult<Option<RemoteOpOutcome<V>>> {
        let Some(remote) = &self.remote else {
            return Ok(None);
        };
        match remote.execute(kind, key, value, timeout) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(RemoteStatus::InvalidDelta) => Err(RegionError::InvalidDelta),
            Err(status) => Err(RegionError::Remote(status)),
        }
    }

    // ---- entry expiry wiring ------------------------------------------------

    fn schedule_entry_expiry(&self, key: &K, entry: &Arc<EntryState<K, V>>) {
        let attrs = self.attrs.read();
        if !attrs.expiration_enabled() {
            return;
        }
        let policy = attrs
            .entry_time_to_live()
            .map(|p| (p.timeout, p.action, true))
            .or_else(|| attrs.entry_idle_timeout().map(|p| (p.timeout, p.action, false)));
        drop(attrs);
        let Some((timeout, action, use_last_modified)) = policy else {
            return;
        };

        let weak_region = self.self_weak.lock().clone();
        let key = key.clone();
        let task = Arc::new(EntryExpiryTask::new(
            Arc::downgrade(&self.expiry),
            timeout,
            use_last_modified,
            entry.clone(),
            Box::new(move |_entry| {
                if let Some(region) = weak_region.upgrade() {
                    region.apply_entry_expiration(&key, action);
                }
            }),
        ));
        if let Some(id) = self.expiry.schedule(task.clone(), timeout, Duration::ZERO) {
            task.bind_id(id);
            if let Some(exp) = entry.exp() {
                exp.set_task_id(id);
            }
        }
    }

    fn apply_entry_expiration(&self, key: &K, action: ExpirationAction) {
        self.stats.record_expire();
        let local_only = matches!(action, ExpirationAction::LocalDestroy | ExpirationAction::LocalInvalidate);
        let mut flags = EventFlags(EventFlags::EXPIRATION);
        if local_only {
            flags.set(EventFlags::LOCAL);
        }
        match action {
            ExpirationAction::Destroy | ExpirationAction::LocalDestroy => {
                let _ = self.destroy(key.clone(), flags);
            }
            ExpirationAction::Invalidate | ExpirationAction::LocalInvalidate => {
                let _ = self.invalidate(key.clone(), flags);
            }
        }
    }

    fn schedule_tombstone_expiry(&self, key: &K) -> Option<u64> {
        let entries = self.backend.entries_arc();
        let task = Arc::new(TombstoneExpiryTask::new(entries, key.clone()));
        self.expiry.schedule(task, DEFAULT_TOMBSTONE_TIMEOUT, Duration::ZERO)
    }

    // ---- region expiry wiring -----------------------------------------------

    fn schedule_region_expiry(self: &Arc<Self>) {
        let attrs = self.attrs.read();
        let ttl = attrs.region_time_to_live();
        let idle = attrs.region_idle_timeout();
        drop(attrs);

        if let Some(policy) = ttl {
            let weak_region = Arc::downgrade(self);
            let id = self.spawn_region_expiry_task(policy.timeout, true, policy.action, weak_region);
            self.region_expiry.lock().ttl = id.unwrap_or(0);
        }
        if let Some(policy) = idle {
            let weak_region = Arc::downgrade(self);
            let id = self.spawn_region_expiry_task(policy.timeout, false, policy.action, weak_region);
            self.region_expiry.lock().idle = id.unwrap_or(0);
        }
    }

    fn spawn_region_expiry_task(
        &self,
        timeout: Duration,
        use_last_modified: bool,
        action: ExpirationAction,
        weak_region: Weak<LocalRegion<K, V>>,
    ) -> Option<u64> {
        let stats_accessed = weak_region.clone();
        let stats_modified = weak_region.clone();
        let fire_region = weak_region;
        let task = Arc::new(RegionExpiryTask::new(
            Arc::downgrade(&self.expiry),
            timeout,
            use_last_modified,
            Box::new(move || stats_accessed.upgrade().map(|r| r.stats.last_accessed_nanos()).unwrap_or(0)),
            Box::new(move || stats_modified.upgrade().map(|r| r.stats.last_modified_nanos()).unwrap_or(0)),
            Box::new(move || {
                if let Some(region) = fire_region.upgrade() {
                    region.apply_region_expiration(action);
                }
            }),
        ));
        let id = self.expiry.schedule(task.clone(), timeout, Duration::ZERO)?;
        task.bind_id(id);
        Some(id)
    }

    fn apply_region_expiration(&self, action: ExpirationAction) {
        self.stats.record_expire();
        match action {
            ExpirationAction::Destroy => {
                if let Some(region) = self.self_arc() {
                    let _ = region.destroy_region(EventFlags(EventFlags::EXPIRATION));
                }
            }
            ExpirationAction::LocalDestroy => {
                if let Some(region) = self.self_arc() {
                    let _ = region.destroy_region(EventFlags(EventFlags::EXPIRATION | EventFlags::LOCAL));
                }
            }
            ExpirationAction::Invalidate => {
                let _ = self.invalidate_region(EventFlags(EventFlags::EXPIRATION));
            }
            ExpirationAction::LocalInvalidate => {
                let _ = self.invalidate_region(EventFlags(EventFlags::EXPIRATION | EventFlags::LOCAL));
            }
        }
    }

    // ---- single-entry operations --------------------------------------------

    /// spec §4.9 `get`: local hit short-circuits; a miss consults the
    /// configured loader, then caches the loaded value locally without a
    /// remote round trip (the loader is the region's own on-miss source).
    pub fn get(&self, key: &K) -> RegionResult<Option<V>> {
        self.check_not_destroying()?;
        if let Some(value) = self.backend.storage().get(key)? {
            self.stats.record_hit();
            // The LRU backend already touches `exp` inside its own `get` (to
            // pair the access with `recentlyUsed`); the plain backend never
            // does, so idle-timeout tracking would otherwise only ever see
            // writes. Touch it here too, uniformly for both backends.
            if let Some(entry) = self.backend.get_entry(key) {
                if let Some(exp) = entry.exp() {
                    exp.touch_accessed();
                }
            }
            return Ok(Some(value));
        }
        self.stats.record_miss();

        let attrs = self.attrs.read();
        let Some(loader) = attrs.loader().cloned() else {
            return Ok(None);
        };
        drop(attrs);
        let value = loader
            .load(key)
            .map_err(|e| RegionError::LoaderFailure(e.to_string()))?;
        self.backend.storage().put(key.clone(), value.clone(), None, None, false, None)?;
        if let Some(entry) = self.backend.get_entry(key) {
            self.schedule_entry_expiry(key, &entry);
        }
        Ok(Some(value))
    }

    /// spec §4.9 `create`.
    pub fn create(&self, key: K, value: V, flags: EventFlags) -> RegionResult<()> {
        self.check_not_destroying()?;
        let event = EntryEvent {
            key: key.clone(),
            old_value: None,
            new_value: Some(value.clone()),
            flags,
        };
        self.consult_writer(WriteKind::Create, &event)?;

        if !flags.is_local_only() {
            let timeout = self.validate_timeout(None)?;
            self.do_remote(RemoteOpKind::Create, &key, Some(&value), timeout)?;
        }

        self.backend.storage().create(key.clone(), value, None)?;
        self.stats.record_create();
        if let Some(entry) = self.backend.get_entry(&key) {
            self.schedule_entry_expiry(&key, &entry);
        }
        self.notify_listener(WriteKind::Create, &event)?;
        Ok(())
    }

    /// spec §4.9 `put`: `updateNoThrow<Put>`. `tracked_update_count`, when
    /// `Some`, is a prior `add_tracker_for_entry` snapshot to apply
    /// conditionally (used by notification replay racing a concurrent local
    /// write). Invalid-delta from either the remote call or the local apply
    /// triggers one full-object refetch and retry, per spec §4.9 rule v.
    #[allow(clippy::too_many_arguments)]
    pub fn put(
        &self,
        key: K,
        value: V,
        delta: Option<&dyn Delta<V>>,
        flags: EventFlags,
        tracked_update_count: Option<u32>,
    ) -> RegionResult<Option<V>> {
        self.check_not_destroying()?;

        let attrs = self.attrs.read();
        let clone_on_apply = attrs.cloning_enabled;
        let concurrency_checks_enabled = attrs.concurrency_checks_enabled;
        drop(attrs);

        let old_value = self.backend.storage().get(&key)?;
        let event = EntryEvent {
            key: key.clone(),
            old_value: old_value.clone(),
            new_value: Some(value.clone()),
            flags,
        };
        let write_kind = if old_value.is_some() { WriteKind::Update } else { WriteKind::Create };
        self.consult_writer(write_kind, &event)?;

        // Tracker-before-remote-call: without concurrency checks, install a
        // tracker so a notification racing this call can detect staleness,
        // unless the caller already supplied a snapshot (spec §4.9 rule iii).
        // The snapshot `add_tracker_for_entry` returns is what later guards
        // the local apply (spec §4.2.5) — it must be threaded through, not
        // discarded, and the tracker must be torn down on every exit path
        // once this call's local apply has been attempted or abandoned.
        let own_tracker = !concurrency_checks_enabled && tracked_update_count.is_none() && !flags.is_local_only();
        let tracker_snapshot = if own_tracker {
            Some(self.backend.storage().add_tracker_for_entry(&key))
        } else {
            None
        };
        let apply_tracked_count = tracker_snapshot.or(tracked_update_count);

        let mut remote_tag: Option<VersionTag> = None;
        if !flags.is_local_only() {
            let timeout = self.validate_timeout(None)?;
            match self.do_remote(RemoteOpKind::Put, &key, Some(&value), timeout) {
                Ok(Some(outcome)) => remote_tag = outcome.version_tag,
                Ok(None) => {}
                Err(RegionError::InvalidDelta) => {
                    return self.retry_put_after_invalid_delta(key, flags, tracked_update_count, own_tracker);
                }
                Err(e) => {
                    if own_tracker {
                        self.backend.storage().remove_tracker_for_entry(&key);
                    }
                    return Err(e);
                }
            }
        }

        let outcome = self.backend.storage().put(
            key.clone(),
            value,
            remote_tag.as_ref(),
            delta,
            clone_on_apply,
            apply_tracked_count,
        );
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(RegionError::EntryUpdated) => {
                // Remote already applied; a racing local write superseded
                // ours. Silent skip of the local apply (spec §4.9 rule iv).
                // The segment never reaches its own tracker-clearing branch
                // on this path, so the bracket installed above is ours to
                // release.
                if own_tracker {
                    self.backend.storage().remove_tracker_for_entry(&key);
                }
                return Ok(old_value);
            }
            Err(RegionError::InvalidDelta) => {
                return self.retry_put_after_invalid_delta(key, flags, tracked_update_count, own_tracker);
            }
            Err(e) => {
                if own_tracker {
                    self.backend.storage().remove_tracker_for_entry(&key);
                }
                return Err(e);
            }
        };

        self.stats.record_update();
        if let Some(entry) = self.backend.get_entry(&key) {
            if let Some(exp) = entry.exp() {
                exp.touch_modified();
            }
            if entry.exp().map(|e| e.task_id().is_none()).unwrap_or(false) {
                self.schedule_entry_expiry(&key, &entry);
            }
        }
        self.notify_listener(write_kind, &event)?;
        Ok(outcome.previous)
    }

    fn retry_put_after_invalid_delta(
        &self,
        key: K,
        flags: EventFlags,
        tracked_update_count: Option<u32>,
        own_tracker: bool,
    ) -> RegionResult<Option<V>> {
        let Some(remote) = &self.remote else {
            return Err(RegionError::InvalidDelta);
        };
        let (full_value, tag) = remote.get_full_object(&key).map_err(RegionError::Remote)?;
        if own_tracker {
            self.backend.storage().remove_tracker_for_entry(&key);
        }
        let event = EntryEvent {
            key: key.clone(),
            old_value: self.backend.storage().get(&key)?,
            new_value: Some(full_value.clone()),
            flags,
        };
        let outcome = self
            .backend
            .storage()
            .put(key.clone(), full_value, Some(&tag), None, false, tracked_update_count)?;
        self.stats.record_update();
        self.notify_listener(WriteKind::Update, &event)?;
        Ok(outcome.previous)
    }

    /// spec §4.9 `invalidate`.
    pub fn invalidate(&self, key: K, flags: EventFlags) -> RegionResult<()> {
        self.check_not_destroying()?;
        let old_value = self.backend.storage().get(&key)?;
        let event = EntryEvent {
            key: key.clone(),
            old_value,
            new_value: None,
            flags,
        };
        self.consult_writer(WriteKind::Destroy, &event)?;

        if !flags.is_local_only() {
            let timeout = self.validate_timeout(None)?;
            self.do_remote(RemoteOpKind::Invalidate, &key, None, timeout)?;
        }

        self.backend.storage().invalidate(key, None)?;
        self.stats.record_invalidate();
        self.notify_listener(WriteKind::Destroy, &event)
    }

    /// spec §4.9 `destroy`.
    pub fn destroy(&self, key: K, flags: EventFlags) -> RegionResult<Option<V>> {
        self.check_not_destroying()?;
        let old_value = self.backend.storage().get(&key)?;
        let event = EntryEvent {
            key: key.clone(),
            old_value: old_value.clone(),
            new_value: None,
            flags,
        };
        self.consult_writer(WriteKind::Destroy, &event)?;

        if !flags.is_local_only() {
            let timeout = self.validate_timeout(None)?;
            self.do_remote(RemoteOpKind::Destroy, &key, None, timeout)?;
        }

        let schedule = |k: &K| self.schedule_tombstone_expiry(k);
        let previous = self.backend.storage().remove(key, None, None, &schedule)?;
        self.stats.record_destroy();
        self.notify_listener(WriteKind::Destroy, &event)?;
        Ok(previous.or(old_value))
    }

    // ---- whole-region operations ---------------------------------------------

    /// spec §4.9 region clear: drops every entry locally, vetoable by
    /// `before_region_clear` unless the event is cache-close.
    pub fn clear(&self, flags: EventFlags) -> RegionResult<()> {
        self.check_not_destroying()?;
        let event = RegionEvent { flags };
        if !flags.writer_veto_exempt() {
            let attrs = self.attrs.read();
            if let Some(writer) = attrs.writer().cloned() {
                drop(attrs);
                if !writer.before_region_clear(&event) {
                    return Err(RegionError::WriterVeto);
                }
            }
        }
        for (key, _) in self.backend.storage().get_values() {
            let _ = self.backend.storage().invalidate(key, None);
        }
        let attrs = self.attrs.read();
        if let Some(listener) = attrs.listener().cloned() {
            drop(attrs);
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| listener.after_region_clear(&event)));
        }
        Ok(())
    }

    /// spec §4.9 region invalidate: propagates to sub-regions depth-first.
    pub fn invalidate_region(&self, flags: EventFlags) -> RegionResult<()> {
        self.check_not_destroying()?;
        for sub in self.sub_regions.lock().values() {
            sub.invalidate_region(flags)?;
        }
        self.clear(flags)?;
        let attrs = self.attrs.read();
        if let Some(listener) = attrs.listener().cloned() {
            drop(attrs);
            let event = RegionEvent { flags };
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| listener.after_region_invalidate(&event)));
        }
        Ok(())
    }

    /// spec §4.9 region destroy: sets the destroy-pending fail-fast flag
    /// before recursing so concurrent entry operations observe it, destroys
    /// sub-regions depth-first, then unregisters from the eviction
    /// controller and cancels this region's own expiry timers.
    pub fn destroy_region(&self, flags: EventFlags) -> RegionResult<()> {
        let event = RegionEvent { flags };
        if !flags.writer_veto_exempt() {
            let attrs = self.attrs.read();
            if let Some(writer) = attrs.writer().cloned() {
                drop(attrs);
                if !writer.before_region_destroy(&event) {
                    return Err(RegionError::WriterVeto);
                }
            }
        }
        self.destroy_pending.store(true, Ordering::Release);

        let children: Vec<Arc<LocalRegion<K, V>>> = self.sub_regions.lock().drain().map(|(_, v)| v).collect();
        for child in children {
            child.destroy_region(flags)?;
        }

        if let Some(ec) = &self.eviction_controller {
            ec.unregister_region(&self.full_path);
        }
        let ids = self.region_expiry.lock();
        if ids.ttl != 0 {
            self.expiry.cancel(ids.ttl);
        }
        if ids.idle != 0 {
            self.expiry.cancel(ids.idle);
        }
        drop(ids);

        if let Some(parent) = &self.parent {
            if let Some(parent) = parent.upgrade() {
                parent.sub_regions.lock().remove(&self.name);
            }
        }

        let attrs = self.attrs.read();
        if let Some(listener) = attrs.listener().cloned() {
            drop(attrs);
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| listener.after_region_destroy(&event)));
        }
        Ok(())
    }

    // ---- sub-region tree -----------------------------------------------------

    pub fn create_sub_region(self: &Arc<Self>, name: impl Into<String>, attrs: RegionAttributes<K, V>) -> RegionResult<Arc<Self>> {
        self.check_not_destroying()?;
        let name = name.into();
        let mut subs = self.sub_regions.lock();
        if subs.contains_key(&name) {
            return Err(RegionError::state("sub-region already exists"));
        }
        let full_path = format!("{}/{}", self.full_path, name);
        let child = Self::build(
            name.clone(),
            full_path,
            attrs,
            self.expiry.clone(),
            self.eviction_controller.clone(),
            self.remote.clone(),
            Some(Arc::downgrade(self)),
        );
        subs.insert(name, child.clone());
        Ok(child)
    }

    pub fn get_sub_region(&self, name: &str) -> Option<Arc<LocalRegion<K, V>>> {
        self.sub_regions.lock().get(name).cloned()
    }

    pub fn sub_region_names(&self) -> Vec<String> {
        self.sub_regions.lock().keys().cloned().collect()
    }
}

impl<K, V> std::fmt::Debug for LocalRegion<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRegion").field("full_path", &self.full_path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::RegionAttributesBuilder;
    use testing::NoopRemoteOp;

    /// Regression for a tracker installed by `put`'s own `own_tracker`
    /// bracket (concurrency checks off, no caller-supplied snapshot): it
    /// must guard the local apply and then be torn down, never left
    /// dangling as an inert, permanently-"tracked" no-op (spec §4.2.5).
    #[test]
    fn puts_own_tracker_bracket_is_cleared_after_a_successful_apply() {
        let attrs: RegionAttributes<String, i32> = RegionAttributesBuilder::new()
            .concurrency_checks_enabled(false)
            .build()
            .unwrap();
        let region: Arc<LocalRegion<String, i32>> =
            LocalRegion::open("r", attrs, ExpiryTaskManager::new(), None, Some(Arc::new(NoopRemoteOp)));

        region.create("k".to_string(), 1, EventFlags::normal()).unwrap();
        region
            .put("k".to_string(), 2, None, EventFlags::normal(), None)
            .unwrap();

        let entry = region.backend.get_entry(&"k".to_string()).unwrap();
        assert!(
            !entry.tracker().is_tracked(),
            "the bracket put installed for itself must be released once the apply completes"
        );
    }
}
