//! Task registry: the owned arena of per-task records.
//!
//! The registry holds one slot per submitted task, indexed by the task's
//! sequential [`TaskId`]. It is the only shared mutable state inside the
//! pool and is protected by a single mutex held for strictly bounded
//! critical sections — never across a task's execution or while blocking.
//!
//! Callers never hold references into the arena. Lookups hand out
//! [`TaskSnapshot`]s, which clone the slot's metadata and share the result
//! or error by `Arc`. A snapshot may be stale by the time the caller
//! observes it; that is by contract (the registry offers no transactional
//! read guarantee).
//!
//! Settlement (a record reaching [`TaskState::Terminated`] or
//! [`TaskState::Failed`]) is broadcast on a condition variable so that
//! [`TaskRegistry::await_settled`] can park instead of polling.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{PoolError, TaskError};

/// Identifier of a submitted task.
///
/// Ids are assigned sequentially from 0 in submission order and are never
/// reused for the lifetime of the pool that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TaskId(u64);

impl TaskId {
    /// Returns the raw sequential value of this id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u64)
    }

    fn index(self) -> usize {
        usize::try_from(self.0).expect("task id exceeds address space")
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TaskState {
    /// Submitted but not yet picked up by a worker.
    Idle,
    /// Currently executing on a worker slot.
    Running,
    /// Completed successfully; the result is stored.
    Terminated,
    /// The unit of work returned an error or panicked; the failure is stored.
    Failed,
}

impl TaskState {
    /// Returns true once the record has left `Idle`/`Running` for good.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }

    /// Returns a human-readable name for the state.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Read-only view of one task record.
///
/// Exactly one of `result`/`error` is populated once `state` is settled;
/// both are `None` while the task is `Idle` or `Running`.
#[derive(Debug)]
pub struct TaskSnapshot<T> {
    /// The task's id.
    pub id: TaskId,
    /// State at the time the snapshot was taken.
    pub state: TaskState,
    /// The task's output, present only in `Terminated`.
    pub result: Option<Arc<T>>,
    /// The captured failure, present only in `Failed`.
    pub error: Option<Arc<TaskError>>,
}

// Manual impl: `Arc` clones regardless of whether `T: Clone`.
impl<T> Clone for TaskSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state: self.state,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

#[derive(Debug)]
struct TaskSlot<T> {
    state: TaskState,
    result: Option<Arc<T>>,
    error: Option<Arc<TaskError>>,
}

impl<T> TaskSlot<T> {
    fn snapshot(&self, id: TaskId) -> TaskSnapshot<T> {
        TaskSnapshot {
            id,
            state: self.state,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

/// Arena of task records, indexed by sequential [`TaskId`].
///
/// Records are retained for the registry's lifetime; there is no garbage
/// collection of settled records.
#[derive(Debug)]
pub struct TaskRegistry<T> {
    slots: Mutex<Vec<TaskSlot<T>>>,
    settled: Condvar,
}

impl<T> Default for TaskRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            settled: Condvar::new(),
        }
    }

    /// Allocates the next sequential id with a fresh `Idle` slot.
    pub(crate) fn allocate(&self) -> TaskId {
        let mut slots = self.slots.lock().expect("registry lock poisoned");
        let id = TaskId::from_index(slots.len());
        slots.push(TaskSlot {
            state: TaskState::Idle,
            result: None,
            error: None,
        });
        id
    }

    /// Transitions `Idle -> Running` immediately before invocation.
    pub(crate) fn mark_running(&self, id: TaskId) {
        let mut slots = self.slots.lock().expect("registry lock poisoned");
        let slot = &mut slots[id.index()];
        debug_assert_eq!(slot.state, TaskState::Idle, "task {id} started twice");
        slot.state = TaskState::Running;
    }

    /// Settles a record with its outcome and wakes every waiter.
    pub(crate) fn settle(&self, id: TaskId, outcome: Result<T, TaskError>) {
        {
            let mut slots = self.slots.lock().expect("registry lock poisoned");
            let slot = &mut slots[id.index()];
            debug_assert!(!slot.state.is_settled(), "task {id} settled twice");
            match outcome {
                Ok(value) => {
                    slot.state = TaskState::Terminated;
                    slot.result = Some(Arc::new(value));
                }
                Err(error) => {
                    slot.state = TaskState::Failed;
                    slot.error = Some(Arc::new(error));
                }
            }
        }
        self.settled.notify_all();
    }

    /// Number of records ever allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().expect("registry lock poisoned").len()
    }

    /// Returns true if no task has been allocated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only lookup of one record.
    pub fn snapshot(&self, id: TaskId) -> Result<TaskSnapshot<T>, PoolError> {
        let slots = self.slots.lock().expect("registry lock poisoned");
        slots
            .get(id.index())
            .map(|slot| slot.snapshot(id))
            .ok_or(PoolError::TaskNotFound(id))
    }

    /// Snapshots of every record currently in `Running`, in no particular
    /// order.
    #[must_use]
    pub fn running(&self) -> Vec<TaskSnapshot<T>> {
        let slots = self.slots.lock().expect("registry lock poisoned");
        slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == TaskState::Running)
            .map(|(index, slot)| slot.snapshot(TaskId::from_index(index)))
            .collect()
    }

    /// Blocks until the record settles or the timeout elapses.
    ///
    /// Returns `Ok(true)` once the record has settled, `Ok(false)` if the
    /// timeout elapsed first. `None` blocks indefinitely.
    pub fn await_settled(
        &self,
        id: TaskId,
        timeout: Option<Duration>,
    ) -> Result<bool, PoolError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut slots = self.slots.lock().expect("registry lock poisoned");
        if id.index() >= slots.len() {
            return Err(PoolError::TaskNotFound(id));
        }

        while !slots[id.index()].state.is_settled() {
            match deadline {
                None => {
                    slots = self
                        .settled
                        .wait(slots)
                        .expect("registry lock poisoned");
                }
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(false);
                    }
                    let (guard, _) = self
                        .settled
                        .wait_timeout(slots, remaining)
                        .expect("registry lock poisoned");
                    slots = guard;
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn ids_are_sequential_from_zero() {
        init_test("ids_are_sequential_from_zero");
        let registry: TaskRegistry<()> = TaskRegistry::new();
        for expected in 0..5u64 {
            let id = registry.allocate();
            crate::assert_with_log!(
                id.as_u64() == expected,
                "sequential id",
                expected,
                id.as_u64()
            );
        }
        crate::assert_with_log!(registry.len() == 5, "registry len", 5usize, registry.len());
        crate::test_complete!("ids_are_sequential_from_zero");
    }

    #[test]
    fn snapshot_of_unknown_id_is_not_found() {
        init_test("snapshot_of_unknown_id_is_not_found");
        let registry: TaskRegistry<u32> = TaskRegistry::new();
        let missing = TaskId::from_index(3);
        let err = registry.snapshot(missing).expect_err("expected not found");
        let matches = matches!(err, PoolError::TaskNotFound(id) if id == missing);
        crate::assert_with_log!(matches, "not found error", true, matches);
        crate::test_complete!("snapshot_of_unknown_id_is_not_found");
    }

    #[test]
    fn settle_stores_exactly_one_outcome() {
        init_test("settle_stores_exactly_one_outcome");
        let registry: TaskRegistry<u32> = TaskRegistry::new();

        let ok_id = registry.allocate();
        registry.mark_running(ok_id);
        registry.settle(ok_id, Ok(11));
        let snapshot = registry.snapshot(ok_id).expect("known id");
        crate::assert_with_log!(
            snapshot.state == TaskState::Terminated,
            "terminated state",
            TaskState::Terminated,
            snapshot.state
        );
        assert_eq!(snapshot.result.as_deref(), Some(&11));
        assert!(snapshot.error.is_none());

        let err_id = registry.allocate();
        registry.mark_running(err_id);
        registry.settle(err_id, Err(TaskError::Panicked("boom".to_string())));
        let snapshot = registry.snapshot(err_id).expect("known id");
        crate::assert_with_log!(
            snapshot.state == TaskState::Failed,
            "failed state",
            TaskState::Failed,
            snapshot.state
        );
        assert!(snapshot.result.is_none());
        assert!(snapshot.error.is_some());
        crate::test_complete!("settle_stores_exactly_one_outcome");
    }

    #[test]
    fn running_lists_only_running_records() {
        init_test("running_lists_only_running_records");
        let registry: TaskRegistry<u32> = TaskRegistry::new();
        let idle = registry.allocate();
        let running = registry.allocate();
        let done = registry.allocate();
        registry.mark_running(running);
        registry.mark_running(done);
        registry.settle(done, Ok(0));

        let listed = registry.running();
        crate::assert_with_log!(listed.len() == 1, "running count", 1usize, listed.len());
        assert_eq!(listed[0].id, running);
        assert_ne!(listed[0].id, idle);
        crate::test_complete!("running_lists_only_running_records");
    }

    #[test]
    fn await_settled_returns_immediately_when_already_settled() {
        init_test("await_settled_returns_immediately_when_already_settled");
        let registry: TaskRegistry<u32> = TaskRegistry::new();
        let id = registry.allocate();
        registry.mark_running(id);
        registry.settle(id, Ok(7));

        let settled = registry.await_settled(id, None).expect("known id");
        crate::assert_with_log!(settled, "already settled", true, settled);
        crate::test_complete!("await_settled_returns_immediately_when_already_settled");
    }

    #[test]
    fn await_settled_times_out_on_idle_record() {
        init_test("await_settled_times_out_on_idle_record");
        let registry: TaskRegistry<u32> = TaskRegistry::new();
        let id = registry.allocate();

        let settled = registry
            .await_settled(id, Some(Duration::from_millis(20)))
            .expect("known id");
        crate::assert_with_log!(!settled, "timed out", false, settled);
        crate::test_complete!("await_settled_times_out_on_idle_record");
    }

    #[test]
    fn await_settled_unknown_id_is_not_found() {
        init_test("await_settled_unknown_id_is_not_found");
        let registry: TaskRegistry<u32> = TaskRegistry::new();
        let err = registry
            .await_settled(TaskId::from_index(0), Some(Duration::from_millis(1)))
            .expect_err("expected not found");
        let matches = matches!(err, PoolError::TaskNotFound(_));
        crate::assert_with_log!(matches, "not found", true, matches);
        crate::test_complete!("await_settled_unknown_id_is_not_found");
    }

    #[test]
    fn await_settled_wakes_on_settlement_from_another_thread() {
        init_test("await_settled_wakes_on_settlement_from_another_thread");
        let registry = std::sync::Arc::new(TaskRegistry::<u32>::new());
        let id = registry.allocate();
        registry.mark_running(id);

        let settler = std::sync::Arc::clone(&registry);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            settler.settle(id, Ok(99));
        });

        let settled = registry
            .await_settled(id, Some(Duration::from_secs(5)))
            .expect("known id");
        crate::assert_with_log!(settled, "woken on settlement", true, settled);
        handle.join().expect("settler panicked");

        let snapshot = registry.snapshot(id).expect("known id");
        assert_eq!(snapshot.result.as_deref(), Some(&99));
        crate::test_complete!("await_settled_wakes_on_settlement_from_another_thread");
    }
}
