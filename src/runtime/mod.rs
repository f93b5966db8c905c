//! The single-threaded cooperative event loop.
//!
//! One event loop drives one flow of control. Tasks are `!Send` futures
//! stored on the loop; parallelism between them comes only from
//! interleaving at suspension points. The loop exposes exactly one driving
//! primitive, [`EventLoop::block_on`], which:
//!
//! - installs the loop in the thread-local slot so the context probe and
//!   the sleep primitive can find it,
//! - polls the root future and every woken task until the root completes,
//! - parks the thread until the earliest timer deadline when nothing is
//!   runnable.
//!
//! Re-entering `block_on` while a loop is already driving the thread is a
//! contract violation surfaced as [`ErrorKind::ReentrantBlock`].

pub mod local;
pub mod timer;
pub mod waker;

use crate::error::{Error, ErrorKind, Result};
use crate::tracing_compat::trace;
use crate::types::TaskId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use timer::TimerHeap;
use waker::WakerState;

/// A task stored on the loop: a type-erased future that reports its result
/// through channels of its own (a `DelayedResult` cell, for scoped tasks).
struct StoredTask {
    future: Pin<Box<dyn Future<Output = ()>>>,
}

struct Shared {
    /// Live tasks by identifier. A task is absent while being polled.
    tasks: RefCell<HashMap<TaskId, StoredTask>>,
    /// Next task identifier (0 is the driver).
    next_task: Cell<u64>,
    /// Pending deadline wakeups.
    timers: RefCell<TimerHeap>,
    /// Woken-task set shared with all wakers handed out by this loop.
    wakers: Arc<WakerState>,
}

/// A single-threaded cooperative event loop.
///
/// Cloning an `EventLoop` clones a handle; all clones drive the same task
/// set. The loop is created either explicitly, by a synchronous tamed call
/// or a synchronously entered scope, or implicitly reused when the caller
/// is already inside a running loop.
#[derive(Clone)]
pub struct EventLoop {
    shared: Rc<Shared>,
}

impl EventLoop {
    /// Creates a new, empty event loop.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared {
                tasks: RefCell::new(HashMap::new()),
                next_task: Cell::new(1),
                timers: RefCell::new(TimerHeap::new()),
                wakers: Arc::new(WakerState::new()),
            }),
        }
    }

    /// Returns true if this handle and `other` drive the same loop.
    #[must_use]
    pub fn same_loop(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Returns the number of live tasks on the loop.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.shared.tasks.borrow().len()
    }

    /// Stores a future as a task and marks it runnable.
    ///
    /// Tasks become runnable in spawn order; the first poll happens on the
    /// next drive of the loop, never inline.
    pub(crate) fn spawn(&self, future: impl Future<Output = ()> + 'static) -> TaskId {
        let raw = self.shared.next_task.get();
        self.shared.next_task.set(raw + 1);
        let task = TaskId::from_raw(raw);

        self.shared.tasks.borrow_mut().insert(
            task,
            StoredTask {
                future: Box::pin(future),
            },
        );
        self.shared.wakers.wake(task);
        trace!(task = %task, "task spawned");
        task
    }

    /// Registers a deadline wakeup for a task.
    pub(crate) fn register_timer(&self, task: TaskId, deadline: Instant) {
        self.shared.timers.borrow_mut().insert(task, deadline);
    }

    /// Drives the loop until `future` completes, returning its output.
    ///
    /// This is the sync/async bridge: the calling thread parks between
    /// scheduling quanta and all tasks stored on the loop progress while
    /// the root future is pending.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ReentrantBlock`] if any event loop is already
    /// driving the current thread.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        if local::loop_is_running() {
            return Err(Error::new(ErrorKind::ReentrantBlock)
                .with_context("block_on called while an event loop is already running"));
        }
        let _guard = local::enter_loop(self.clone());

        let mut root = Box::pin(future);
        let root_waker = waker::waker_for(&self.shared.wakers, TaskId::DRIVER);
        self.shared.wakers.wake(TaskId::DRIVER);

        loop {
            // Fire expired timers.
            let now = Instant::now();
            let expired = self.shared.timers.borrow_mut().pop_expired(now);
            for task in expired {
                self.shared.wakers.wake(task);
            }

            // Poll everything woken so far, in wake order.
            let woken = self.shared.wakers.drain_woken();
            for (i, task) in woken.iter().copied().enumerate() {
                if task.is_driver() {
                    let prev = local::set_current_task(Some(TaskId::DRIVER));
                    let poll = root.as_mut().poll(&mut Context::from_waker(&root_waker));
                    local::set_current_task(prev);
                    if let Poll::Ready(value) = poll {
                        // Hand wakes we have not serviced back to the set so
                        // a later drive picks them up.
                        for task in &woken[i + 1..] {
                            self.shared.wakers.wake(*task);
                        }
                        return Ok(value);
                    }
                } else {
                    self.poll_task(task);
                }
            }

            if self.shared.wakers.has_woken() {
                continue;
            }

            // Nothing runnable: park until the earliest deadline.
            let deadline = self.shared.timers.borrow().peek_deadline();
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    }
                }
                None => panic!(
                    "event loop stalled: root future pending with no runnable tasks and no timers"
                ),
            }
        }
    }

    fn poll_task(&self, task: TaskId) {
        // A completed task may still receive wakes; treat them as stale.
        let Some(mut stored) = self.shared.tasks.borrow_mut().remove(&task) else {
            return;
        };

        let waker = waker::waker_for(&self.shared.wakers, task);
        let prev = local::set_current_task(Some(task));
        let poll = stored.future.as_mut().poll(&mut Context::from_waker(&waker));
        local::set_current_task(prev);

        match poll {
            Poll::Pending => {
                self.shared.tasks.borrow_mut().insert(task, stored);
            }
            Poll::Ready(()) => {
                trace!(task = %task, "task finished");
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("tasks", &self.shared.tasks.borrow().len())
            .field("timers", &self.shared.timers.borrow().len())
            .finish()
    }
}
