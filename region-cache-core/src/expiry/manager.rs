//! # ExpiryTaskManager
//!
//! A single-threaded cooperative event loop scheduling typed expiry tasks
//! by absolute deadline (spec §4.6). Grounded in the same background
//! thread plus stop-flag shape as `MemoryEngine::start_expirer`, extended
//! with a `BinaryHeap` min-heap of deadlines and a `Condvar` so the loop
//! sleeps exactly until the next deadline instead of polling.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use region_cache_common::{RegionError, RegionResult};

use super::task::ExpiryTask;

struct TaskRecord {
    task: Arc<dyn ExpiryTask>,
    interval: Duration,
    /// Bumped on every reset/cancel so stale heap entries popped later are
    /// recognized as superseded and ignored (the cancellation race of
    /// spec §4.6, pre-dispatch half). `cancel` removes the record outright
    /// rather than flagging it, so there is nothing left here for a fire
    /// already past this check to consult; the in-flight half of the race
    /// is instead the task's own problem to guard against (see `on_expire`
    /// on `EntryExpiryTask`/`RegionExpiryTask`/`TombstoneExpiryTask`, which
    /// hold only a `Weak` or a guarded removal and so no-op harmlessly if
    /// the thing they'd act on is already gone by the time they run).
    generation: u64,
    /// True while `on_expire()` is running for this task on the loop
    /// thread. A `reset` that arrives during this window still rearms the
    /// task but reports zero canceled pending fires, since there wasn't
    /// one to cancel.
    in_flight: bool,
}

struct HeapEntry {
    fire_at: Instant,
    id: u64,
    generation: u64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fire_at.cmp(&other.fire_at)
    }
}

struct ManagerState {
    tasks: std::collections::HashMap<u64, TaskRecord>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    next_id: u64,
    running: bool,
}

/// Process-wide scheduler for entry/region/tombstone/PDX expiry tasks.
pub struct ExpiryTaskManager {
    state: Mutex<ManagerState>,
    cv: Condvar,
    wake: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

const INVALID_ID: u64 = 0;

impl ExpiryTaskManager {
    pub fn new() -> Arc<Self> {
        Arc::new(ExpiryTaskManager {
            state: Mutex::new(ManagerState {
                tasks: std::collections::HashMap::new(),
                heap: BinaryHeap::new(),
                next_id: 1,
                running: false,
            }),
            cv: Condvar::new(),
            wake: AtomicBool::new(false),
            thread: Mutex::new(None),
        })
    }

    pub fn start(self: &Arc<Self>) -> RegionResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.running {
                return Err(RegionError::state("expiry manager already started"));
            }
            state.running = true;
        }
        let manager = Arc::clone(self);
        let join = std::thread::spawn(move || manager.run_loop());
        *self.thread.lock().unwrap() = Some(join);
        Ok(())
    }

    pub fn stop(self: &Arc<Self>) -> RegionResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.running {
                return Err(RegionError::state("expiry manager already stopped"));
            }
            state.running = false;
            state.tasks.clear();
            state.heap.clear();
        }
        self.wake.store(true, Ordering::Release);
        self.cv.notify_all();
        if let Some(join) = self.thread.lock().unwrap().take() {
            let _ = join.join();
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().tasks.len()
    }

    /// spec §4.6 `schedule`. Returns `None` (INVALID) if the manager is
    /// not running.
    pub fn schedule(&self, task: Arc<dyn ExpiryTask>, delay: Duration, interval: Duration) -> Option<u64> {
        let mut state = self.state.lock().unwrap();
        if !state.running {
            return None;
        }
        let id = state.next_id;
        state.next_id += 1;
        let fire_at = Instant::now() + delay;
        state.tasks.insert(
            id,
            TaskRecord {
                task,
                interval,
                generation: 0,
                in_flight: false,
            },
        );
        state.heap.push(Reverse(HeapEntry {
            fire_at,
            id,
            generation: 0,
        }));
        drop(state);
        self.wake.store(true, Ordering::Release);
        self.cv.notify_all();
        Some(id)
    }

    /// spec §4.6 `reset`: cancels any pending fire and rearms for `now +
    /// delay`. Returns the number of pending fires that were canceled
    /// (`0` means the task was mid-callback when this was called), or
    /// `None` if no such task exists.
    pub fn reset(&self, id: u64, delay: Duration) -> Option<i64> {
        let mut state = self.state.lock().unwrap();
        let record = state.tasks.get_mut(&id)?;
        let was_in_flight = record.in_flight;
        record.generation += 1;
        let generation = record.generation;
        let fire_at = Instant::now() + delay;
        state.heap.push(Reverse(HeapEntry {
            fire_at,
            id,
            generation,
        }));
        drop(state);
        self.wake.store(true, Ordering::Release);
        self.cv.notify_all();
        Some(if was_in_flight { 0 } else { 1 })
    }

    /// spec §4.6 `cancel`: cancels and forgets.
    pub fn cancel(&self, id: u64) -> Option<i64> {
        let mut state = self.state.lock().unwrap();
        let existed = state.tasks.remove(&id).is_some();
        if !existed {
            return None;
        }
        Some(1)
    }

    fn run_loop(self: Arc<Self>) {
        loop {
            let mut state = self.state.lock().unwrap();
            if !state.running {
                return;
            }

            let next_fire = state.heap.peek().map(|Reverse(e)| e.fire_at);
            let now = Instant::now();

            let due = match next_fire {
                Some(fire_at) if fire_at <= now => true,
                Some(fire_at) => {
                    let wait_for = fire_at - now;
                    let (guard, _) = self.cv.wait_timeout(state, wait_for).unwrap();
                    state = guard;
                    false
                }
                None => {
                    let guard = self.cv.wait(state).unwrap();
                    state = guard;
                    false
                }
            };

            if !state.running {
                return;
            }
            if !due {
                continue;
            }

            let Reverse(entry) = match state.heap.pop() {
                Some(e) => e,
                None => continue,
            };

            let record_generation = state.tasks.get(&entry.id).map(|r| r.generation);
            if record_generation != Some(entry.generation) {
                // Stale heap entry: the task was reset or cancelled since
                // this fire was scheduled. A `cancel` removes the record
                // outright, so the `None` case lands here too.
                continue;
            }
            let task = state.tasks.get(&entry.id).map(|r| r.task.clone());
            let interval = state.tasks.get(&entry.id).map(|r| r.interval).unwrap_or_default();
            if let Some(record) = state.tasks.get_mut(&entry.id) {
                record.in_flight = true;
            }
            drop(state);

            let task = match task {
                Some(t) => t,
                None => continue,
            };
            let completed = task.on_expire();

            let mut state = self.state.lock().unwrap();
            if let Some(record) = state.tasks.get_mut(&entry.id) {
                record.in_flight = false;
            }
            if !completed {
                // The task rescheduled itself via reset() already.
                continue;
            }
            match state.tasks.get_mut(&entry.id) {
                Some(record) if interval > Duration::ZERO => {
                    record.generation += 1;
                    let generation = record.generation;
                    state.heap.push(Reverse(HeapEntry {
                        fire_at: Instant::now() + interval,
                        id: entry.id,
                        generation,
                    }));
                }
                _ => {
                    state.tasks.remove(&entry.id);
                }
            }
        }
    }
}

/// Sentinel returned by callers that represent "no task scheduled" without
/// wrapping every field in `Option` at call sites that already use `0` as
/// a natural absent marker (mirrors `ExpProps`' `NO_TASK`).
pub const fn is_invalid(id: u64) -> bool {
    id == INVALID_ID
}
