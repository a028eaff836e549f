//! Scheduling, rescheduling, and cancellation of typed expiry tasks (spec
//! §4.6, §4.7).

mod entry_task;
mod manager;
mod pdx_task;
mod region_task;
mod task;
mod tombstone_task;

pub use entry_task::EntryExpiryTask;
pub use manager::ExpiryTaskManager;
pub use pdx_task::PdxUnreadDataExpiryTask;
pub use region_task::RegionExpiryTask;
pub use task::ExpiryTask;
pub use tombstone_task::TombstoneExpiryTask;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingTask(Arc<AtomicU32>);
    impl ExpiryTask for CountingTask {
        fn on_expire(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn schedule_fires_once_after_delay() {
        let manager = ExpiryTaskManager::new();
        manager.start().unwrap();
        let count = Arc::new(AtomicU32::new(0));
        let id = manager
            .schedule(Arc::new(CountingTask(count.clone())), Duration::from_millis(5), Duration::ZERO)
            .unwrap();
        assert!(id > 0);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(manager.count(), 0);
        manager.stop().unwrap();
    }

    #[test]
    fn cancel_prevents_fire() {
        let manager = ExpiryTaskManager::new();
        manager.start().unwrap();
        let count = Arc::new(AtomicU32::new(0));
        let id = manager
            .schedule(Arc::new(CountingTask(count.clone())), Duration::from_millis(20), Duration::ZERO)
            .unwrap();
        assert_eq!(manager.cancel(id), Some(1));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        manager.stop().unwrap();
    }

    #[test]
    fn double_start_is_an_error() {
        let manager = ExpiryTaskManager::new();
        manager.start().unwrap();
        assert!(manager.start().is_err());
        manager.stop().unwrap();
    }

    #[test]
    fn periodic_task_rearms() {
        let manager = ExpiryTaskManager::new();
        manager.start().unwrap();
        let count = Arc::new(AtomicU32::new(0));
        manager
            .schedule(Arc::new(CountingTask(count.clone())), Duration::from_millis(5), Duration::from_millis(5))
            .unwrap();
        std::thread::sleep(Duration::from_millis(60));
        manager.stop().unwrap();
        assert!(count.load(Ordering::SeqCst) >= 3);
    }
}
