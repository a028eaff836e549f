//! # EvictionController
//!
//! Global heap-usage-driven eviction across all registered regions (spec
//! §4.8). One instance per process; every heap-mode LRU region registers
//! itself and reports its footprint deltas through [`Self::increment_heap_size`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

/// A region-like thing the controller can ask to shed approximately a
/// fraction of its entries. Implemented by `LruEntriesMap` (via a thin
/// adapter in the region orchestrator) so the controller itself never
/// needs to be generic over `K`/`V`.
pub trait EvictableRegion: Send + Sync {
    fn evict(&self, fraction: f64);
}

/// How much further past 1.0 to push the requested eviction fraction, so
/// the controller trends back under budget instead of asymptotically
/// approaching it (spec §4.8 `overshoot_pct`).
const DELTA_FACTOR: f64 = 0.05;

struct ControllerState {
    regions: HashMap<String, Arc<dyn EvictableRegion>>,
}

pub struct EvictionController {
    max_heap_bytes: i64,
    heap_size: AtomicI64,
    state: Mutex<ControllerState>,
    cv: Condvar,
    stopped: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EvictionController {
    pub fn new(max_heap_mib: u64) -> Arc<Self> {
        Arc::new(EvictionController {
            max_heap_bytes: (max_heap_mib as i64) * 1024 * 1024,
            heap_size: AtomicI64::new(0),
            state: Mutex::new(ControllerState {
                regions: HashMap::new(),
            }),
            cv: Condvar::new(),
            stopped: AtomicBool::new(false),
            thread: Mutex::new(None),
        })
    }

    pub fn start(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        let join = std::thread::spawn(move || controller.run_loop());
        *self.thread.lock().unwrap() = Some(join);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.cv.notify_all();
        if let Some(join) = self.thread.lock().unwrap().take() {
            let _ = join.join();
        }
    }

    pub fn register_region(&self, name: impl Into<String>, region: Arc<dyn EvictableRegion>) {
        self.state.lock().unwrap().regions.insert(name.into(), region);
        self.cv.notify_all();
    }

    pub fn unregister_region(&self, name: &str) {
        self.state.lock().unwrap().regions.remove(name);
    }

    pub fn heap_size(&self) -> i64 {
        self.heap_size.load(Ordering::Acquire)
    }

    pub fn increment_heap_size(&self, delta: i64) {
        self.heap_size.fetch_add(delta, Ordering::AcqRel);
        self.cv.notify_all();
    }

    fn over_budget(&self) -> bool {
        self.heap_size.load(Ordering::Acquire) > self.max_heap_bytes
    }

    fn run_loop(self: Arc<Self>) {
        let mut guard = self.state.lock().unwrap();
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return;
            }
            if !self.over_budget() {
                guard = self.cv.wait(guard).unwrap();
                continue;
            }

            // Snapshot the registered regions and release the set lock
            // before evicting, so a slow eviction never blocks a concurrent
            // register/unregister (spec §4.8).
            let snapshot: Vec<Arc<dyn EvictableRegion>> = guard.regions.values().cloned().collect();
            drop(guard);

            let heap_size = self.heap_size.load(Ordering::Acquire) as f64;
            let max = self.max_heap_bytes.max(1) as f64;
            let overshoot_pct = (heap_size - max) / max + DELTA_FACTOR;
            for region in &snapshot {
                region.evict(overshoot_pct);
            }

            guard = self.state.lock().unwrap();
            // Loop back to the `over_budget` check instead of waiting
            // unconditionally: one eviction round may not have brought heap
            // usage back under budget, and nothing else will notify the
            // condvar in that case (spec §4.8 wants the controller to keep
            // evicting until it is, not just react once per signal).
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct CountingRegion(AtomicU32);
    impl EvictableRegion for CountingRegion {
        fn evict(&self, _fraction: f64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn crossing_budget_triggers_eviction() {
        let controller = EvictionController::new(1);
        let region = Arc::new(CountingRegion(AtomicU32::new(0)));
        controller.register_region("r1", region.clone());
        controller.start();

        controller.increment_heap_size(2 * 1024 * 1024);
        std::thread::sleep(std::time::Duration::from_millis(50));

        assert!(region.0.load(Ordering::SeqCst) >= 1);
        controller.stop();
    }
}
