//! Per-entry expiration bookkeeping (spec §5).
//!
//! These fields are atomic so the background expiry task can read an
//! entry's idle/modified timestamps without taking the owning segment's
//! lock — only the scheduled-task id needs a lock-free swap when the task
//! is rescheduled or cancelled.

use std::sync::atomic::{AtomicU64, Ordering};

use region_cache_common::now_nanos;

const NO_TASK: u64 = 0;

#[derive(Debug)]
pub struct ExpProps {
    last_accessed_nanos: AtomicU64,
    last_modified_nanos: AtomicU64,
    /// Id of the scheduled expiry task watching this entry, or `NO_TASK`.
    /// Stored as `AtomicI64` cast space would be wasteful; `u64` with `0`
    /// reserved works since the manager never hands out id `0`.
    task_id: AtomicU64,
}

impl ExpProps {
    pub fn new() -> Self {
        let now = now_nanos();
        ExpProps {
            last_accessed_nanos: AtomicU64::new(now),
            last_modified_nanos: AtomicU64::new(now),
            task_id: AtomicU64::new(NO_TASK),
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

    pub fn task_id(&self) -> Option<u64> {
        match self.task_id.load(Ordering::Acquire) {
            NO_TASK => None,
            id => Some(id),
        }
    }

    pub fn set_task_id(&self, id: u64) {
        self.task_id.store(id, Ordering::Release);
    }

    /// Clears and returns the scheduled task id, if any, so the caller can
    /// cancel it exactly once.
    pub fn take_task_id(&self) -> Option<u64> {
        let prev = self.task_id.swap(NO_TASK, Ordering::AcqRel);
        if prev == NO_TASK {
            None
        } else {
            Some(prev)
        }
    }
}

impl Default for ExpProps {
    fn default() -> Self {
        ExpProps::new()
    }
}
