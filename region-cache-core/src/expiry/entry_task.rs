//! `EntryExpiryTask` (spec §4.7): per-entry TTL/idle-timeout enforcement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use region_cache_common::now_nanos;

use crate::entry::EntryState;

use super::manager::ExpiryTaskManager;
use super::task::ExpiryTask;

/// Fires against a single entry's idle-access or last-modified timestamp.
/// `perform_action` is supplied by the region orchestrator and carries out
/// whichever of `INVALIDATE`/`LOCAL_INVALIDATE`/`DESTROY`/`LOCAL_DESTROY`
/// the region's expiration policy selected, tagged with the `EXPIRATION`
/// event flag.
pub struct EntryExpiryTask<K, V> {
    manager: Weak<ExpiryTaskManager>,
    id: AtomicU64,
    timeout: Duration,
    use_last_modified: bool,
    entry: Arc<EntryState<K, V>>,
    perform_action: Box<dyn Fn(&Arc<EntryState<K, V>>) + Send + Sync>,
}

impl<K, V> EntryExpiryTask<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(
        manager: Weak<ExpiryTaskManager>,
        timeout: Duration,
        use_last_modified: bool,
        entry: Arc<EntryState<K, V>>,
        perform_action: Box<dyn Fn(&Arc<EntryState<K, V>>) + Send + Sync>,
    ) -> Self {
        EntryExpiryTask {
            manager,
            id: AtomicU64::new(0),
            timeout,
            use_last_modified,
            entry,
            perform_action,
        }
    }

    pub fn bind_id(&self, id: u64) {
        self.id.store(id, Ordering::Release);
    }

    fn expire_at_nanos(&self) -> u64 {
        let exp = self.entry.expect_exp();
        let touched = if self.use_last_modified {
            exp.last_modified_nanos()
        } else {
            exp.last_accessed_nanos()
        };
        touched.saturating_add(self.timeout.as_nanos() as u64)
    }
}

impl<K, V> ExpiryTask for EntryExpiryTask<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
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
        (self.perform_action)(&self.entry);
        true
    }
}
