//! Waker implementation with deduplication.
//!
//! Wakers notify the event loop that a task is ready to make progress.
//! The loop itself is single-threaded, but `std::task::Waker` must be
//! `Send + Sync`, so the woken set lives behind a mutex.
//!
//! Note: This implementation uses safe Rust only (no unsafe).

use crate::types::TaskId;
use std::sync::{Arc, Mutex};
use std::task::{Wake, Waker};

/// Shared state for the waker system.
#[derive(Debug, Default)]
pub struct WakerState {
    /// Tasks that have been woken, in wake order.
    woken: Mutex<Vec<TaskId>>,
}

/// Creates a waker that marks `task` woken in `state`.
#[must_use]
pub fn waker_for(state: &Arc<WakerState>, task: TaskId) -> Waker {
    Waker::from(Arc::new(TaskWaker {
        state: Arc::clone(state),
        task,
    }))
}

impl WakerState {
    /// Creates a new waker state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a task as woken directly, without going through a waker.
    pub fn wake(&self, task: TaskId) {
        let mut woken = self.woken.lock().expect("waker lock poisoned");
        if !woken.contains(&task) {
            woken.push(task);
        }
    }

    /// Drains all woken tasks in wake order.
    pub fn drain_woken(&self) -> Vec<TaskId> {
        let mut woken = self.woken.lock().expect("waker lock poisoned");
        std::mem::take(&mut *woken)
    }

    /// Returns true if any tasks have been woken.
    #[must_use]
    pub fn has_woken(&self) -> bool {
        let woken = self.woken.lock().expect("waker lock poisoned");
        !woken.is_empty()
    }
}

/// A waker for a specific task.
struct TaskWaker {
    state: Arc<WakerState>,
    task: TaskId,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.state.wake(self.task);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.state.wake(self.task);
    }
}
