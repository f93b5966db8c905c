//! Sleep future for delaying execution.
//!
//! The [`Sleep`] future completes after a deadline has passed. It
//! registers a deadline wakeup with the event loop driving the current
//! thread, so the loop can park instead of spinning.

use crate::runtime::local;
use crate::types::TaskId;
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Suspends the current task for at least `duration`.
///
/// A zero duration suspends for exactly one scheduling quantum: the task
/// yields and becomes runnable again on the next drive of the loop.
///
/// # Example
///
/// ```ignore
/// use tamer::time::sleep;
/// use std::time::Duration;
///
/// sleep(Duration::from_millis(100)).await;
/// ```
#[must_use]
pub fn sleep(duration: Duration) -> Sleep {
    Sleep::new(Instant::now() + duration)
}

/// Suspends the current task until `deadline` has passed.
#[must_use]
pub fn sleep_until(deadline: Instant) -> Sleep {
    Sleep::new(deadline)
}

/// A future that completes after a deadline.
///
/// # Cancel Safety
///
/// `Sleep` is cancel-safe. Dropping it stops the wait with no side
/// effects; a stale timer entry on the loop wakes a task that simply has
/// nothing to do.
///
/// # Outside the runtime
///
/// When polled on a foreign executor there is no timer heap to register
/// with; the future falls back to waking itself on every poll, which is
/// correct but busy. Inside a tamer event loop the thread parks until the
/// deadline.
#[derive(Debug)]
pub struct Sleep {
    deadline: Instant,
    /// Whether this sleep has suspended at least once. A sleep never
    /// completes on its first poll, so a zero-duration sleep still yields.
    yielded: Cell<bool>,
}

impl Sleep {
    /// Creates a new `Sleep` that completes at the given deadline.
    #[must_use]
    pub const fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            yielded: Cell::new(false),
        }
    }

    /// Returns the deadline for this sleep.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns the remaining duration until the deadline.
    ///
    /// Returns `Duration::ZERO` if the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Checks if the deadline has elapsed.
    #[must_use]
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded.get() && self.is_elapsed() {
            return Poll::Ready(());
        }
        self.yielded.set(true);

        match local::current_loop() {
            Some(event_loop) => {
                let task = local::current_task().unwrap_or(TaskId::DRIVER);
                event_loop.register_timer(task, self.deadline);
            }
            // Foreign executor: no timer heap, poll again promptly.
            None => cx.waker().wake_by_ref(),
        }
        Poll::Pending
    }
}
