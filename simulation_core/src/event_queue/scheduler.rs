//! Virtual-time scheduler for delayed event activation.
//!
//! Time only moves when [`DelayScheduler::advance`] is called, which makes delays
//! deterministic under test and lets the host decide how wall-clock time maps
//! onto the simulation.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Handle of a scheduled task, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

struct SchedulerState<T> {
    now: Duration,
    next_id: u64,
    /// Ordered by due time, then by scheduling order.
    tasks: BTreeMap<(Duration, TaskId), T>,
    due_by_id: HashMap<TaskId, Duration>,
}

/// Cancellable delayed tasks carrying a payload of type `T`.
pub struct DelayScheduler<T> {
    state: RefCell<SchedulerState<T>>,
}

impl<T> DelayScheduler<T> {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(SchedulerState {
                now: Duration::ZERO,
                next_id: 0,
                tasks: BTreeMap::new(),
                due_by_id: HashMap::new(),
            }),
        }
    }

    /// Schedule `task` to become due `delay` from now.
    pub fn schedule(&self, delay: Duration, task: T) -> TaskId {
        let mut state = self.state.borrow_mut();
        let id = TaskId(state.next_id);
        state.next_id += 1;

        let due = state.now.saturating_add(delay);
        state.tasks.insert((due, id), task);
        state.due_by_id.insert(id, due);
        id
    }

    /// Cancel a task. Returns false if it already fired or was cancelled.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.due_by_id.remove(&id) {
            Some(due) => state.tasks.remove(&(due, id)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.state.borrow().due_by_id.contains_key(&id)
    }

    /// Move time forward and return every task that became due, earliest first.
    pub fn advance(&self, by: Duration) -> Vec<(TaskId, T)> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let target = state.now.saturating_add(by);

        let mut due = Vec::new();
        while let Some(entry) = state.tasks.first_entry() {
            let (when, id) = *entry.key();
            if when > target {
                break;
            }
            let task = entry.remove();
            state.due_by_id.remove(&id);
            due.push((id, task));
        }

        state.now = target;
        due
    }

    /// Elapsed virtual time.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    pub fn pending_count(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    /// Time until the next task is due, if any.
    pub fn next_due_in(&self) -> Option<Duration> {
        let state = self.state.borrow();
        state
            .tasks
            .keys()
            .next()
            .map(|(due, _)| due.saturating_sub(state.now))
    }
}

impl<T> Default for DelayScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
