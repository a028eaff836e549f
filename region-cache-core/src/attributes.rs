//! # Region Attributes
//!
//! The immutable-by-default configuration surface of a region (spec §3,
//! §6). Most fields are genuinely immutable after region open; the LRU
//! limit, expiration timeouts/actions, and callback references may be
//! changed at runtime through [`RegionAttributesMutator`], gated on the
//! corresponding feature having been enabled at creation (spec §4.9).

use std::sync::Arc;
use std::time::Duration;

use crate::region::callbacks::{CacheListener, CacheLoader, CacheWriter};
use crate::region::remote::PersistenceManager;
use region_cache_common::{RegionError, RegionResult};

/// Action taken on an LRU eviction victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LruEvictionAction {
    LocalDestroy,
    Destroy,
    LocalInvalidate,
    OverflowToDisk,
}

/// Action taken when an entry or region TTL/idle timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationAction {
    Invalidate,
    LocalInvalidate,
    Destroy,
    LocalDestroy,
}

/// A configured expiration timeout plus the action to take when it fires.
/// `timeout == Duration::ZERO` is never constructed — expiration being
/// enabled is represented by `Option<ExpirationPolicy>` being `Some`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    pub timeout: Duration,
    pub action: ExpirationAction,
}

impl ExpirationPolicy {
    pub fn new(timeout: Duration, action: ExpirationAction) -> RegionResult<Self> {
        if timeout.is_zero() {
            return Err(RegionError::argument(
                "expiration timeout must be greater than zero",
            ));
        }
        Ok(ExpirationPolicy { timeout, action })
    }
}

/// Immutable-at-open configuration for a region, plus the handful of fields
/// the attributes mutator is allowed to change later.
pub struct RegionAttributes<K, V> {
    pub caching_enabled: bool,
    pub concurrency_checks_enabled: bool,
    pub concurrency_level: u32,
    pub initial_capacity: u32,
    pub cloning_enabled: bool,

    pub(crate) lru_entries_limit: u32,
    pub(crate) heap_lru_enabled: bool,
    pub(crate) lru_eviction_action: LruEvictionAction,

    pub(crate) entry_time_to_live: Option<ExpirationPolicy>,
    pub(crate) entry_idle_timeout: Option<ExpirationPolicy>,
    pub(crate) region_time_to_live: Option<ExpirationPolicy>,
    pub(crate) region_idle_timeout: Option<ExpirationPolicy>,

    pub(crate) listener: Option<Arc<dyn CacheListener<K, V>>>,
    pub(crate) writer: Option<Arc<dyn CacheWriter<K, V>>>,
    pub(crate) loader: Option<Arc<dyn CacheLoader<K, V>>>,
    pub(crate) persistence_manager: Option<Arc<dyn PersistenceManager<K, V>>>,
}

impl<K, V> RegionAttributes<K, V> {
    /// True if LRU bookkeeping (list membership, `recentlyUsed`/`evicted`
    /// flags) must be composed onto every entry: either a per-region count
    /// limit is set, or the process-wide heap controller is in play (spec
    /// §4.4: "A process-wide heap-size controlled by the
    /// EvictionController. When heap mode is active and lruLimit == 0,
    /// per-region count limits are disabled").
    pub fn lru_enabled(&self) -> bool {
        self.lru_entries_limit > 0 || self.heap_lru_enabled
    }

    pub fn heap_lru_enabled(&self) -> bool {
        self.heap_lru_enabled
    }

    pub fn expiration_enabled(&self) -> bool {
        self.entry_time_to_live.is_some()
            || self.entry_idle_timeout.is_some()
            || self.region_time_to_live.is_some()
            || self.region_idle_timeout.is_some()
    }

    pub fn lru_entries_limit(&self) -> u32 {
        self.lru_entries_limit
    }

    pub fn lru_eviction_action(&self) -> LruEvictionAction {
        self.lru_eviction_action
    }

    pub fn entry_time_to_live(&self) -> Option<ExpirationPolicy> {
        self.entry_time_to_live
    }

    pub fn entry_idle_timeout(&self) -> Option<ExpirationPolicy> {
        self.entry_idle_timeout
    }

    pub fn region_time_to_live(&self) -> Option<ExpirationPolicy> {
        self.region_time_to_live
    }

    pub fn region_idle_timeout(&self) -> Option<ExpirationPolicy> {
        self.region_idle_timeout
    }

    pub fn listener(&self) -> Option<&Arc<dyn CacheListener<K, V>>> {
        self.listener.as_ref()
    }

    pub fn writer(&self) -> Option<&Arc<dyn CacheWriter<K, V>>> {
        self.writer.as_ref()
    }

    pub fn loader(&self) -> Option<&Arc<dyn CacheLoader<K, V>>> {
        self.loader.as_ref()
    }

    pub fn persistence_manager(&self) -> Option<&Arc<dyn PersistenceManager<K, V>>> {
        self.persistence_manager.as_ref()
    }
}

/// Builder for [`RegionAttributes`], applying the boundary clamps spec §8
/// requires (`concurrencyLevel == 0` and `initialCapacity == 0` clamp rather
/// than error).
pub struct RegionAttributesBuilder<K, V> {
    caching_enabled: bool,
    concurrency_checks_enabled: bool,
    concurrency_level: u32,
    initial_capacity: u32,
    cloning_enabled: bool,
    lru_entries_limit: u32,
    heap_lru_enabled: bool,
    lru_eviction_action: LruEvictionAction,
    entry_time_to_live: Option<ExpirationPolicy>,
    entry_idle_timeout: Option<ExpirationPolicy>,
    region_time_to_live: Option<ExpirationPolicy>,
    region_idle_timeout: Option<ExpirationPolicy>,
    listener: Option<Arc<dyn CacheListener<K, V>>>,
    writer: Option<Arc<dyn CacheWriter<K, V>>>,
    loader: Option<Arc<dyn CacheLoader<K, V>>>,
    persistence_manager: Option<Arc<dyn PersistenceManager<K, V>>>,
}

impl<K, V> Default for RegionAttributesBuilder<K, V> {
    fn default() -> Self {
        RegionAttributesBuilder {
            caching_enabled: true,
            concurrency_checks_enabled: false,
            concurrency_level: 16,
            initial_capacity: 16,
            cloning_enabled: false,
            lru_entries_limit: 0,
            heap_lru_enabled: false,
            lru_eviction_action: LruEvictionAction::LocalDestroy,
            entry_time_to_live: None,
            entry_idle_timeout: None,
            region_time_to_live: None,
            region_idle_timeout: None,
            listener: None,
            writer: None,
            loader: None,
            persistence_manager: None,
        }
    }
}

impl<K, V> RegionAttributesBuilder<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn caching_enabled(mut self, value: bool) -> Self {
        self.caching_enabled = value;
        self
    }

    pub fn concurrency_checks_enabled(mut self, value: bool) -> Self {
        self.concurrency_checks_enabled = value;
        self
    }

    pub fn concurrency_level(mut self, value: u32) -> Self {
        self.concurrency_level = value;
        self
    }

    pub fn initial_capacity(mut self, value: u32) -> Self {
        self.initial_capacity = value;
        self
    }

    pub fn cloning_enabled(mut self, value: bool) -> Self {
        self.cloning_enabled = value;
        self
    }

    pub fn lru_entries_limit(mut self, value: u32) -> Self {
        self.lru_entries_limit = value;
        self
    }

    pub fn heap_lru_enabled(mut self, value: bool) -> Self {
        self.heap_lru_enabled = value;
        self
    }

    pub fn lru_eviction_action(mut self, value: LruEvictionAction) -> Self {
        self.lru_eviction_action = value;
        self
    }

    pub fn entry_time_to_live(mut self, value: ExpirationPolicy) -> Self {
        self.entry_time_to_live = Some(value);
        self
    }

    pub fn entry_idle_timeout(mut self, value: ExpirationPolicy) -> Self {
        self.entry_idle_timeout = Some(value);
        self
    }

    pub fn region_time_to_live(mut self, value: ExpirationPolicy) -> Self {
        self.region_time_to_live = Some(value);
        self
    }

    pub fn region_idle_timeout(mut self, value: ExpirationPolicy) -> Self {
        self.region_idle_timeout = Some(value);
        self
    }

    pub fn listener(mut self, value: Arc<dyn CacheListener<K, V>>) -> Self {
        self.listener = Some(value);
        self
    }

    pub fn writer(mut self, value: Arc<dyn CacheWriter<K, V>>) -> Self {
        self.writer = Some(value);
        self
    }

    pub fn loader(mut self, value: Arc<dyn CacheLoader<K, V>>) -> Self {
        self.loader = Some(value);
        self
    }

    pub fn persistence_manager(mut self, value: Arc<dyn PersistenceManager<K, V>>) -> Self {
        self.persistence_manager = Some(value);
        self
    }

    /// Validates and clamps per spec §8 boundary behaviors, then builds.
    pub fn build(self) -> RegionResult<RegionAttributes<K, V>> {
        if self.lru_eviction_action == LruEvictionAction::OverflowToDisk
            && self.persistence_manager.is_none()
        {
            return Err(RegionError::argument(
                "OVERFLOW_TO_DISK eviction action requires a persistence manager",
            ));
        }

        let concurrency_level = crate::primes::next_prime(self.concurrency_level);
        let initial_capacity = crate::primes::next_prime(self.initial_capacity);

        Ok(RegionAttributes {
            caching_enabled: self.caching_enabled,
            concurrency_checks_enabled: self.concurrency_checks_enabled,
            concurrency_level,
            initial_capacity,
            cloning_enabled: self.cloning_enabled,
            lru_entries_limit: self.lru_entries_limit,
            heap_lru_enabled: self.heap_lru_enabled,
            lru_eviction_action: self.lru_eviction_action,
            entry_time_to_live: self.entry_time_to_live,
            entry_idle_timeout: self.entry_idle_timeout,
            region_time_to_live: self.region_time_to_live,
            region_idle_timeout: self.region_idle_timeout,
            listener: self.listener,
            writer: self.writer,
            loader: self.loader,
            persistence_manager: self.persistence_manager,
        })
    }
}

/// Runtime mutator for the subset of attributes spec §4.9 allows changing
/// after region open. Downgrading an enabled feature to disabled is
/// rejected, per spec.
pub struct RegionAttributesMutator<'a, K, V> {
    attrs: &'a parking_lot::RwLock<RegionAttributes<K, V>>,
}

impl<'a, K, V> RegionAttributesMutator<'a, K, V> {
    pub fn new(attrs: &'a parking_lot::RwLock<RegionAttributes<K, V>>) -> Self {
        RegionAttributesMutator { attrs }
    }

    pub fn set_lru_entries_limit(&self, limit: u32) -> RegionResult<()> {
        let mut attrs = self.attrs.write();
        if !attrs.lru_enabled() && limit > 0 {
            return Err(RegionError::state(
                "cannot enable LRU limit on a region created without one",
            ));
        }
        if attrs.lru_enabled() && limit == 0 {
            return Err(RegionError::state(
                "cannot disable an LRU limit once the region was created with one",
            ));
        }
        attrs.lru_entries_limit = limit;
        Ok(())
    }

    pub fn set_entry_time_to_live(&self, policy: ExpirationPolicy) -> RegionResult<()> {
        let mut attrs = self.attrs.write();
        if attrs.entry_time_to_live.is_none() {
            return Err(RegionError::state(
                "entry TTL was not enabled at region creation",
            ));
        }
        attrs.entry_time_to_live = Some(policy);
        Ok(())
    }

    pub fn set_entry_idle_timeout(&self, policy: ExpirationPolicy) -> RegionResult<()> {
        let mut attrs = self.attrs.write();
        if attrs.entry_idle_timeout.is_none() {
            return Err(RegionError::state(
                "entry idle timeout was not enabled at region creation",
            ));
        }
        attrs.entry_idle_timeout = Some(policy);
        Ok(())
    }

    pub fn set_region_time_to_live(&self, policy: ExpirationPolicy) -> RegionResult<()> {
        let mut attrs = self.attrs.write();
        if attrs.region_time_to_live.is_none() {
            return Err(RegionError::state(
                "region TTL was not enabled at region creation",
            ));
        }
        attrs.region_time_to_live = Some(policy);
        Ok(())
    }

    pub fn set_region_idle_timeout(&self, policy: ExpirationPolicy) -> RegionResult<()> {
        let mut attrs = self.attrs.write();
        if attrs.region_idle_timeout.is_none() {
            return Err(RegionError::state(
                "region idle timeout was not enabled at region creation",
            ));
        }
        attrs.region_idle_timeout = Some(policy);
        Ok(())
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn CacheListener<K, V>>>) {
        self.attrs.write().listener = listener;
    }

    pub fn set_writer(&self, writer: Option<Arc<dyn CacheWriter<K, V>>>) {
        self.attrs.write().writer = writer;
    }

    pub fn set_loader(&self, loader: Option<Arc<dyn CacheLoader<K, V>>>) {
        self.attrs.write().loader = loader;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_concurrency_level_clamps_to_smallest_prime() {
        let attrs: RegionAttributes<String, String> = RegionAttributesBuilder::new()
            .concurrency_level(0)
            .build()
            .unwrap();
        assert_eq!(attrs.concurrency_level, crate::primes::MIN_PRIME);
    }

    #[test]
    fn overflow_without_persistence_manager_rejected() {
        let result: RegionResult<RegionAttributes<String, String>> = RegionAttributesBuilder::new()
            .lru_entries_limit(10)
            .lru_eviction_action(LruEvictionAction::OverflowToDisk)
            .build();
        assert!(result.is_err());
    }
}
