//! `RegionExpiryTask` (spec §4.7): same idle/TTL pattern as
//! [`super::entry_task::EntryExpiryTask`], at region granularity, driven by
//! the region's own last-accessed/last-modified statistics instead of a
//! single entry's.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use std::time::Duration;

use region_cache_common::now_nanos;

use super::manager::ExpiryTaskManager;
use super::task::ExpiryTask;

pub struct RegionExpiryTask {
    manager: Weak<ExpiryTaskManager>,
    id: AtomicU64,
    timeout: Duration,
    use_last_modified: bool,
    last_accessed_nanos: Box<dyn Fn() -> u64 + Send + Sync>,
    last_modified_nanos: Box<dyn Fn() -> u64 + Send + Sync>,
    perform_action: Box<dyn Fn() + Send + Sync>,
}

impl RegionExpiryTask {
    pub fn new(
        manager: Weak<ExpiryTaskManager>,
        timeout: Duration,
        use_last_modified: bool,
        last_accessed_nanos: Box<dyn Fn() -> u64 + Send + Sync>,
        last_modified_nanos: Box<dyn Fn() -> u64 + Send + Sync>,
        perform_action: Box<dyn Fn() + Send + Sync>,
    ) -> Self {
        RegionExpiryTask {
            manager,
            id: AtomicU64::new(0),
            timeout,
            use_last_modified,
            last_accessed_nanos,
            last_modified_nanos,
            perform_action,
        }
    }

    pub fn bind_id(&self, id: u64) {
        self.id.store(id, Ordering::Release);
    }

    fn expire_at_nanos(&self) -> u64 {
        let touched = if self.use_last_modified {
            (self.last_modified_nanos)()
        } else {
            (self.last_accessed_nanos)()
        };
        touched.saturating_add(self.timeout.as_nanos() as u64)
    }
}

impl ExpiryTask for RegionExpiryTask {
    fn on_expire(&self) -> bool {
        let now = now_nanos();
        let expire_at = self.expire_at_nanos();
        if expire_at > now {
            if let Some(manager) = self.manager.upgrade() {
                let id = self.id.load(Ordering::Acquire);
                manager.reset(id, Duration::from_nanos(expire_at - now));
            }
            return false;
        }
        (self.perform_action)();
        true
    }
}
