//! Delayed-delivery queue of certificate ids.
//!
//! Entries become due at an instant read from the manager's clock. An id is
//! held at most once; rescheduling replaces its due time. Superseded heap
//! entries are dropped lazily when popped.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Reverse<(DateTime<Utc>, String)>>,
    due_at: HashMap<String, DateTime<Utc>>,
    /// Set by `wake`, consumed by `wait`.
    signalled: bool,
}

#[derive(Default)]
pub struct RetryQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `id` for delivery at `at`, replacing any earlier schedule.
    pub fn schedule(&self, id: &str, at: DateTime<Utc>) {
        {
            let mut state = self.lock();
            if state.due_at.insert(id.to_string(), at) != Some(at) {
                state.heap.push(Reverse((at, id.to_string())));
            }
        }
        self.wake();
    }

    pub fn remove(&self, id: &str) -> bool {
        self.lock().due_at.remove(id).is_some()
    }

    /// Pops every id due at or before `now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut state = self.lock();
        let mut due = Vec::new();

        while let Some(Reverse((at, _))) = state.heap.peek() {
            if *at > now {
                break;
            }
            let Some(Reverse((at, id))) = state.heap.pop() else {
                break;
            };
            if state.due_at.get(&id) == Some(&at) {
                state.due_at.remove(&id);
                due.push(id);
            }
        }
        due
    }

    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        self.lock().due_at.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.lock().due_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wakes a worker blocked in `wait`.
    pub fn wake(&self) {
        self.lock().signalled = true;
        self.changed.notify_all();
    }

    /// Blocks until `wake` is called or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) {
        let guard = self.lock();
        let (mut guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |state| !state.signalled)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.signalled = false;
    }
}
