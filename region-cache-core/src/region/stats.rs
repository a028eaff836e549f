//! # RegionStats
//!
//! Advisory counters and the region-level last-accessed/last-modified
//! timestamps `RegionExpiryTask` reads for region TTL/idle-timeout (spec
//! §4.7, §4.9). None of these counters participate in correctness — a
//! miscounted hit never changes what a `get` returns.

use std::sync::atomic::{AtomicU64, Ordering};

use region_cache_common::now_nanos;

#[derive(Debug, Default)]
pub struct RegionStats {
    hits: AtomicU64,
    misses: AtomicU64,
    creates: AtomicU64,
    updates: AtomicU64,
    invalidates: AtomicU64,
    destroys: AtomicU64,
    expires: AtomicU64,
    evictions: AtomicU64,
    last_accessed_nanos: AtomicU64,
    last_modified_nanos: AtomicU64,
}

impl RegionStats {
    pub fn new() -> Self {
        let now = now_nanos();
        RegionStats {
            last_accessed_nanos: AtomicU64::new(now),
            last_modified_nanos: AtomicU64::new(now),
            ..Default::default()
        }
    }

    pub fn touch_accessed(&self) {
        self.last_accessed_nanos.store(now_nanos(), Ordering::Release);
    }

    pub fn touch_modified(&self) {
        let now = now_nanos();
        self.last_modified_nanos.store(now, Ordering::Release);
        self.last_accessed_nanos.store(now, Ordering::Release);
    }

    pub fn last_accessed_nanos(&self) -> u64 {
        self.last_accessed_nanos.load(Ordering::Acquire)
    }

    pub fn last_modified_nanos(&self) -> u64 {
        self.last_modified_nanos.load(Ordering::Acquire)
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.touch_accessed();
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.touch_accessed();
    }

    pub fn record_create(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
        self.touch_modified();
    }

    pub fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.touch_modified();
    }

    pub fn record_invalidate(&self) {
        self.invalidates.fetch_add(1, Ordering::Relaxed);
        self.touch_modified();
    }

    pub fn record_destroy(&self) {
        self.destroys.fetch_add(1, Ordering::Relaxed);
        self.touch_modified();
    }

    pub fn record_expire(&self) {
        self.expires.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn creates(&self) -> u64 {
        self.creates.load(Ordering::Relaxed)
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    pub fn invalidates(&self) -> u64 {
        self.invalidates.load(Ordering::Relaxed)
    }

    pub fn destroys(&self) -> u64 {
        self.destroys.load(Ordering::Relaxed)
    }

    pub fn expires(&self) -> u64 {
        self.expires.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss_counters_move_independently() {
        let stats = RegionStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hits(), 2);
        assert_eq!(stats.misses(), 1);
    }

    #[test]
    fn modify_bumps_both_timestamps() {
        let stats = RegionStats::new();
        let before = stats.last_modified_nanos();
        std::thread::sleep(std::time::Duration::from_millis(1));
        stats.record_create();
        assert!(stats.last_modified_nanos() >= before);
        assert!(stats.last_accessed_nanos() >= stats.last_modified_nanos());
    }
}
