//! The single-assignment delayed result cell.
//!
//! A [`DelayedResult`] decouples a scoped task (the producer) from possibly
//! multiple consumers and from the owning scope's exit-time aggregator. It
//! is a value, not a running computation: it cannot be cancelled through
//! the handle and exposes no intermediate state.
//!
//! # Observation and error consumption
//!
//! Three observations exist: [`DelayedResult::wait`] (async),
//! [`DelayedResult::block`] (sync, drives the event loop) and
//! [`DelayedResult::value`] (non-waiting; fails with
//! [`ErrorKind::NotReady`](crate::error::ErrorKind::NotReady) while
//! pending). Observing a stored failure marks it **consumed**: it stays
//! readable, but no longer counts toward the owning scope's end-of-scope
//! aggregation. This is how callers explicitly acknowledge a failure.
//!
//! Repeated observation is permitted and returns the same value or error
//! each time; only the first observation changes aggregation state.

use crate::error::{Error, ErrorKind, Result};
use crate::runtime::{local, EventLoop};
use crate::tracing_compat::trace;
use crate::types::Outcome;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

enum CellSlot<T> {
    Pending,
    Ready(Outcome<T>),
}

/// The shared state behind a [`DelayedResult`].
///
/// The owning scope holds the producer half through [`ErasedResult`]; any
/// number of `DelayedResult` handles hold the consumer half.
pub(crate) struct ResultCell<T> {
    slot: RefCell<CellSlot<T>>,
    consumed: Cell<bool>,
    waiters: RefCell<Vec<Waker>>,
}

impl<T> ResultCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: RefCell::new(CellSlot::Pending),
            consumed: Cell::new(false),
            waiters: RefCell::new(Vec::new()),
        }
    }

    /// Stores the terminal outcome, exactly once, and wakes all waiters.
    ///
    /// A cancelled outcome arrives pre-consumed: the cancellation mechanism
    /// itself is the observer, so it never re-raises at scope exit.
    pub(crate) fn complete(&self, outcome: Outcome<T>) -> Result<()> {
        {
            let mut slot = self.slot.borrow_mut();
            if matches!(*slot, CellSlot::Ready(_)) {
                return Err(Error::new(ErrorKind::ResultAlreadySet)
                    .with_context("delayed result fulfilled or failed twice"));
            }
            if outcome.is_cancelled() {
                self.consumed.set(true);
            }
            *slot = CellSlot::Ready(outcome);
        }
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for waker in waiters {
            waker.wake();
        }
        Ok(())
    }

    pub(crate) fn is_terminal(&self) -> bool {
        matches!(*self.slot.borrow(), CellSlot::Ready(_))
    }

    fn add_waiter(&self, waker: &Waker) {
        let mut waiters = self.waiters.borrow_mut();
        if !waiters.iter().any(|w| w.will_wake(waker)) {
            waiters.push(waker.clone());
        }
    }
}

impl<T: Clone> ResultCell<T> {
    /// Materializes the stored outcome, marking a failure consumed.
    fn observe(&self) -> Result<T> {
        let slot = self.slot.borrow();
        match &*slot {
            CellSlot::Pending => Err(Error::not_ready()),
            CellSlot::Ready(outcome) => {
                if outcome.is_aggregatable_failure() {
                    self.consumed.set(true);
                }
                outcome.clone().into_result()
            }
        }
    }
}

/// Type-erased view of a result cell, held by the owning scope.
pub(crate) trait ErasedResult {
    /// Returns true once the backing task reached a terminal state.
    fn is_terminal(&self) -> bool;
    /// Returns the stored failure if it would aggregate at scope exit.
    fn unconsumed_error(&self) -> Option<Error>;
    /// Registers a waker to be woken at completion.
    fn add_waiter(&self, waker: &Waker);
}

impl<T> ErasedResult for ResultCell<T> {
    fn is_terminal(&self) -> bool {
        Self::is_terminal(self)
    }

    fn unconsumed_error(&self) -> Option<Error> {
        if self.consumed.get() {
            return None;
        }
        match &*self.slot.borrow() {
            CellSlot::Ready(outcome) if outcome.is_aggregatable_failure() => outcome.to_error(),
            _ => None,
        }
    }

    fn add_waiter(&self, waker: &Waker) {
        Self::add_waiter(self, waker);
    }
}

/// A one-shot cell holding either a value or an error produced by a scoped
/// task.
///
/// Handles are cheap to clone and read-only: holders never own the backing
/// task. The owning scope guarantees the cell reaches a terminal state by
/// the time the scope closes, so reading [`value`](Self::value) after scope
/// exit always succeeds or reports the stored failure.
pub struct DelayedResult<T> {
    cell: Rc<ResultCell<T>>,
    driver: EventLoop,
}

impl<T> DelayedResult<T> {
    pub(crate) fn new(cell: Rc<ResultCell<T>>, driver: EventLoop) -> Self {
        Self { cell, driver }
    }

    /// Returns true once the backing task reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.cell.is_terminal()
    }

    /// Suspends until the result is terminal, then returns the value or
    /// raises the stored error (marking it consumed).
    ///
    /// Repeated waits are permitted and observe the same outcome.
    pub fn wait(&self) -> Wait<'_, T> {
        Wait { cell: &self.cell }
    }
}

impl<T: Clone> DelayedResult<T> {
    /// Non-waiting observation of the result.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::NotReady`] while the backing task is still running,
    ///   a distinct kind from any task failure.
    /// - The stored error, if the task failed; reading it marks it
    ///   consumed.
    pub fn value(&self) -> Result<T> {
        self.cell.observe()
    }

    /// Blocks the calling thread until the result is terminal by driving
    /// the owning scope's event loop, then observes the result.
    ///
    /// Sibling tasks on the same loop progress while this call blocks.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::ReentrantBlock`] if called while an event loop is
    ///   already running on this thread (use [`wait`](Self::wait) there).
    /// - The stored error, if the task failed; reading it marks it
    ///   consumed.
    pub fn block(&self) -> Result<T> {
        if self.cell.is_terminal() {
            return self.cell.observe();
        }
        if local::loop_is_running() {
            return Err(Error::new(ErrorKind::ReentrantBlock)
                .with_context("DelayedResult::block called inside a running event loop"));
        }
        trace!("blocking on delayed result");
        self.driver.block_on(self.wait())?
    }
}

impl<T> Clone for DelayedResult<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            driver: self.driver.clone(),
        }
    }
}

impl<T> std::fmt::Debug for DelayedResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedResult")
            .field("terminal", &self.cell.is_terminal())
            .finish()
    }
}

/// Future returned by [`DelayedResult::wait`].
pub struct Wait<'a, T> {
    cell: &'a Rc<ResultCell<T>>,
}

impl<T: Clone> Future for Wait<'_, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.cell.is_terminal() {
            Poll::Ready(self.cell.observe())
        } else {
            self.cell.add_waiter(cx.waker());
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CancelReason, PanicPayload};

    fn ready_cell(outcome: Outcome<u32>) -> DelayedResult<u32> {
        let cell = Rc::new(ResultCell::new());
        cell.complete(outcome).unwrap();
        DelayedResult::new(cell, EventLoop::new())
    }

    #[test]
    fn value_on_pending_is_not_ready() {
        let result: DelayedResult<u32> =
            DelayedResult::new(Rc::new(ResultCell::new()), EventLoop::new());
        let err = result.value().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
        assert!(!result.is_terminal());
    }

    #[test]
    fn value_on_fulfilled_returns_value_repeatedly() {
        let result = ready_cell(Outcome::Ok(42));
        assert_eq!(result.value().unwrap(), 42);
        assert_eq!(result.value().unwrap(), 42);
    }

    #[test]
    fn double_completion_is_misuse() {
        let cell: Rc<ResultCell<u32>> = Rc::new(ResultCell::new());
        cell.complete(Outcome::Ok(1)).unwrap();
        let err = cell.complete(Outcome::Ok(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResultAlreadySet);
    }

    #[test]
    fn observing_a_failure_consumes_it() {
        let result = ready_cell(Outcome::Err(Error::user_message("boom")));
        assert!(result.cell.unconsumed_error().is_some());

        let err = result.value().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::User);

        // The error stays readable but no longer aggregates.
        assert!(result.cell.unconsumed_error().is_none());
        assert_eq!(result.value().unwrap_err().kind(), ErrorKind::User);
    }

    #[test]
    fn cancellation_arrives_pre_consumed() {
        let result = ready_cell(Outcome::Cancelled(CancelReason::scope_exit()));
        assert!(result.cell.unconsumed_error().is_none());
        assert_eq!(result.value().unwrap_err().kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn panic_aggregates_until_observed() {
        let result = ready_cell(Outcome::Panicked(PanicPayload::new("oops")));
        assert!(result.cell.unconsumed_error().is_some());
        assert_eq!(result.value().unwrap_err().kind(), ErrorKind::Panicked);
        assert!(result.cell.unconsumed_error().is_none());
    }

    #[test]
    fn block_short_circuits_on_terminal_cell() {
        let result = ready_cell(Outcome::Ok(5));
        assert_eq!(result.block().unwrap(), 5);
    }

    #[test]
    fn wait_completes_when_producer_fulfills() {
        let driver = EventLoop::new();
        let cell: Rc<ResultCell<u32>> = Rc::new(ResultCell::new());
        let result = DelayedResult::new(Rc::clone(&cell), driver.clone());

        driver.spawn(async move {
            cell.complete(Outcome::Ok(11)).unwrap();
        });

        let value = driver.block_on(result.wait()).unwrap().unwrap();
        assert_eq!(value, 11);
    }

    #[test]
    fn block_inside_running_loop_is_misuse() {
        let driver = EventLoop::new();
        let cell: Rc<ResultCell<u32>> = Rc::new(ResultCell::new());
        let result = DelayedResult::new(Rc::clone(&cell), driver.clone());

        let err = driver
            .block_on(async move { result.block().unwrap_err() })
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ReentrantBlock);
    }
}
