//! The task-side contract for everything the manager schedules (spec §4.6).

/// A unit of work the [`super::manager::ExpiryTaskManager`] fires on its
/// single cooperative loop thread. Implementations must not block.
pub trait ExpiryTask: Send + Sync {
    /// Returns `true` when the task completed naturally: a single-shot
    /// task is retired, a periodic one is rearmed at `previous_fire + interval`.
    /// Returns `false` when the task itself called `reset` from within this
    /// call (e.g. an entry whose idle timer hasn't actually elapsed yet),
    /// in which case the manager must not touch the task's schedule again
    /// this round.
    fn on_expire(&self) -> bool;
}
