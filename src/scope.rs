//! Scope configuration and the drain machinery.
//!
//! An [`AsyncScope`] bounds the lifetime of a group of tasks and defines
//! what happens at the boundary. Entering it yields a [`Scope`] handle;
//! tamed functions invoked with that handle are scheduled eagerly onto the
//! scope's event loop and hand back a
//! [`DelayedResult`](crate::delayed::DelayedResult). Exiting the scope
//! *drains* it: every owned task is brought to a terminal state and every
//! failure nobody consumed is re-raised, alone or aggregated.
//!
//! # Nesting
//!
//! Scopes nest lexically: an inner scope drains before the surrounding
//! code continues, while tasks of the outer scope keep progressing because
//! the event loop is shared. A per-thread scope stack lets nested entries
//! find the enclosing scope's loop; a synchronously entered outermost
//! scope creates its own loop and drives it at exit.
//!
//! # Guaranteed release
//!
//! `enter`/`exit` are explicit. Use [`AsyncScope::run`] /
//! [`AsyncScope::run_async`] for closure-delimited scopes where exit
//! cannot be forgotten. Dropping an entered scope without exiting
//! abandons its tasks (they are dropped with the loop) and is reported
//! through the tracing layer; it is never silent data loss for results
//! already observed.

use crate::context::CallContext;
use crate::delayed::{DelayedResult, ErasedResult, ResultCell};
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::{local, EventLoop};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::{CancelReason, ErrorMode, ExitMode, Outcome, PanicPayload, ScopeId};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

thread_local! {
    /// Scopes entered on this thread, innermost last.
    static SCOPE_STACK: RefCell<Vec<Rc<ScopeCore>>> = const { RefCell::new(Vec::new()) };
}

/// The lifecycle phase of a scope.
///
/// State machine:
/// ```text
/// Open ──(exit entered)──► Draining ──(all tasks terminal)──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePhase {
    /// The scope is open and accepting work.
    Open,
    /// Exit has begun; waiting for owned tasks to reach a terminal state.
    Draining,
    /// Terminal state; the drain completed and errors were aggregated.
    Closed,
}

impl ScopePhase {
    /// Returns the numeric encoding for this phase.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Draining => 1,
            Self::Closed => 2,
        }
    }

    /// Decodes a numeric phase value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Open),
            1 => Some(Self::Draining),
            2 => Some(Self::Closed),
            _ => None,
        }
    }

    /// Returns true if the scope can accept new work.
    ///
    /// Scheduling is permitted while draining: a task owned by the scope
    /// may legitimately schedule a sibling during the drain, and the drain
    /// wait re-checks the child list on every pass.
    #[must_use]
    pub const fn can_schedule(self) -> bool {
        matches!(self, Self::Open | Self::Draining)
    }

    /// Returns true if the scope is draining.
    #[must_use]
    pub const fn is_draining(self) -> bool {
        matches!(self, Self::Draining)
    }

    /// Returns true if the scope is terminal.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Cooperative cancellation flag shared between a scope and one task.
pub(crate) struct CancelCell {
    requested: RefCell<Option<CancelReason>>,
    waker: RefCell<Option<Waker>>,
}

impl CancelCell {
    fn new() -> Self {
        Self {
            requested: RefCell::new(None),
            waker: RefCell::new(None),
        }
    }

    /// Requests cancellation, strengthening any earlier request, and wakes
    /// the task so it observes the signal at its next suspension.
    fn signal(&self, reason: &CancelReason) {
        {
            let mut requested = self.requested.borrow_mut();
            match requested.as_mut() {
                Some(existing) => {
                    existing.strengthen(reason);
                }
                None => *requested = Some(reason.clone()),
            }
        }
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }

    fn take_requested(&self) -> Option<CancelReason> {
        self.requested.borrow_mut().take()
    }

    fn register_waker(&self, waker: &Waker) {
        *self.waker.borrow_mut() = Some(waker.clone());
    }
}

struct ChildEntry {
    cell: Rc<dyn ErasedResult>,
    cancel: Rc<CancelCell>,
}

/// Shared scope state: the child list, the phase, and the policies.
struct ScopeCore {
    id: ScopeId,
    phase: Cell<ScopePhase>,
    entered_from: CallContext,
    exit_mode: ExitMode,
    error_mode: ErrorMode,
    children: RefCell<Vec<ChildEntry>>,
    driver: EventLoop,
}

impl ScopeCore {
    fn all_terminal(&self) -> bool {
        self.children.borrow().iter().all(|c| c.cell.is_terminal())
    }

    /// Transitions Open → Draining and applies the exit policy.
    fn begin_drain(&self) {
        self.phase.set(ScopePhase::Draining);
        debug!(scope = %self.id, exit_mode = %self.exit_mode, "scope draining");
        if self.exit_mode == ExitMode::Cancel {
            self.cancel_non_terminal(&CancelReason::scope_exit());
        }
    }

    /// Collects unconsumed failures, closes the scope, and raises them.
    fn finish_drain(&self) -> Result<()> {
        debug_assert!(self.all_terminal(), "drain finished with live tasks");
        self.phase.set(ScopePhase::Closed);
        pop_scope(self.id);

        let mut errors: Vec<Error> = self
            .children
            .borrow()
            .iter()
            .filter_map(|c| c.cell.unconsumed_error())
            .collect();
        self.children.borrow_mut().clear();

        debug!(scope = %self.id, unconsumed = errors.len(), "scope closed");
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::aggregate(errors)),
        }
    }

    /// Signals cancellation to every child that has not reached a terminal
    /// state. Parent-scope tasks are never touched.
    fn cancel_non_terminal(&self, reason: &CancelReason) {
        for child in self.children.borrow().iter() {
            if !child.cell.is_terminal() {
                child.cancel.signal(reason);
            }
        }
    }

    /// Mid-flight reaction to a failing child under `ErrorMode::Cancel`.
    fn on_child_failure(&self) {
        if self.error_mode == ErrorMode::Cancel && !self.phase.get().is_closed() {
            trace!(scope = %self.id, "task failed, cancelling siblings");
            self.cancel_non_terminal(&CancelReason::sibling_failed());
        }
    }
}

impl Drop for ScopeCore {
    fn drop(&mut self) {
        if !self.phase.get().is_closed() && !self.children.borrow().is_empty() {
            warn!(scope = %self.id, "scope dropped without exit; abandoning its tasks");
        }
    }
}

fn push_scope(core: &Rc<ScopeCore>) {
    SCOPE_STACK.with(|stack| stack.borrow_mut().push(Rc::clone(core)));
}

fn pop_scope(id: ScopeId) {
    SCOPE_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if let Some(pos) = stack.iter().rposition(|core| core.id == id) {
            stack.remove(pos);
        }
    });
}

/// Configuration for a scope, in builder style.
///
/// ```
/// use tamer::{AsyncScope, ExitMode};
///
/// let scope = AsyncScope::new()
///     .with_exit_mode(ExitMode::Cancel)
///     .enter();
/// scope.exit().unwrap();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncScope {
    exit_mode: ExitMode,
    error_mode: ErrorMode,
}

impl AsyncScope {
    /// Creates a scope configuration with the default policies
    /// (`ExitMode::Wait`, `ErrorMode::Cancel`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets what happens to still-running tasks at scope exit.
    #[must_use]
    pub const fn with_exit_mode(mut self, exit_mode: ExitMode) -> Self {
        self.exit_mode = exit_mode;
        self
    }

    /// Sets how the scope reacts to a task failing mid-flight.
    #[must_use]
    pub const fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    /// Enters the scope, recording the surrounding context.
    ///
    /// A nested entry reuses the enclosing scope's event loop; an entry
    /// from inside a running loop reuses that loop; a synchronous
    /// outermost entry creates a fresh loop that the exit drain (or a
    /// `DelayedResult::block`) will drive.
    #[must_use]
    pub fn enter(self) -> Scope {
        let (driver, entered_from) = SCOPE_STACK.with(|stack| {
            stack.borrow().last().map(|enclosing| {
                (enclosing.driver.clone(), CallContext::Scoped)
            })
        })
        .or_else(|| local::current_loop().map(|l| (l, CallContext::Async)))
        .unwrap_or_else(|| (EventLoop::new(), CallContext::Sync));

        let core = Rc::new(ScopeCore {
            id: ScopeId::next(),
            phase: Cell::new(ScopePhase::Open),
            entered_from,
            exit_mode: self.exit_mode,
            error_mode: self.error_mode,
            children: RefCell::new(Vec::new()),
            driver,
        });
        push_scope(&core);
        debug!(scope = %core.id, entered_from = %entered_from, "scope entered");
        Scope { core }
    }

    /// Runs `f` inside a freshly entered scope and drains at the end.
    ///
    /// This is the closure-delimited form of `enter`/`exit` for
    /// synchronous callers: release is guaranteed as long as `f` returns.
    pub fn run<R>(self, f: impl FnOnce(&Scope) -> R) -> Result<R> {
        let scope = self.enter();
        let value = f(&scope);
        scope.exit()?;
        Ok(value)
    }

    /// Runs `f` inside a freshly entered scope and drains at the end,
    /// for asynchronous callers.
    pub async fn run_async<R, Fut>(self, f: impl FnOnce(Scope) -> Fut) -> Result<R>
    where
        Fut: Future<Output = R>,
    {
        let scope = self.enter();
        let value = f(scope.clone()).await;
        scope.exit_async().await?;
        Ok(value)
    }
}

/// A handle to an entered scope.
///
/// Handles are cheap to clone; all clones refer to the same scope. The
/// handle schedules work (through a tamed function's `call_scoped`) and
/// eventually exits the scope with [`exit`](Self::exit) or
/// [`exit_async`](Self::exit_async).
#[derive(Clone)]
pub struct Scope {
    core: Rc<ScopeCore>,
}

impl Scope {
    /// Returns the scope's identifier.
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.core.id
    }

    /// Returns the scope's current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ScopePhase {
        self.core.phase.get()
    }

    /// Returns the context the scope was entered from.
    #[must_use]
    pub fn entered_from(&self) -> CallContext {
        self.core.entered_from
    }

    /// Returns the scope's exit policy.
    #[must_use]
    pub fn exit_mode(&self) -> ExitMode {
        self.core.exit_mode
    }

    /// Returns the scope's error policy.
    #[must_use]
    pub fn error_mode(&self) -> ErrorMode {
        self.core.error_mode
    }

    /// Schedules a task onto this scope (internal seam for the tamed
    /// adapter).
    ///
    /// Scheduling is synchronous from the caller's perspective: the task
    /// becomes runnable immediately but makes no progress until the loop
    /// is next driven.
    pub(crate) fn schedule<T, Fut>(&self, future: Fut) -> Result<DelayedResult<T>>
    where
        T: 'static,
        Fut: Future<Output = Result<T>> + 'static,
    {
        if !self.core.phase.get().can_schedule() {
            return Err(Error::new(ErrorKind::ScopeClosed)
                .with_context("cannot schedule onto a closed scope"));
        }

        let cell = Rc::new(ResultCell::new());
        let cancel = Rc::new(CancelCell::new());
        // A task joining a cancel-at-exit scope mid-drain is already due
        // for cancellation; signal it before its first poll.
        if self.core.phase.get().is_draining() && self.core.exit_mode == ExitMode::Cancel {
            cancel.signal(&CancelReason::scope_exit());
        }
        self.core.driver.spawn(ScopedTask {
            future: Box::pin(future),
            cell: Rc::clone(&cell),
            cancel: Rc::clone(&cancel),
            core: Rc::clone(&self.core),
        });
        self.core.children.borrow_mut().push(ChildEntry {
            cell: Rc::clone(&cell) as Rc<dyn ErasedResult>,
            cancel,
        });
        Ok(DelayedResult::new(cell, self.core.driver.clone()))
    }

    /// Exits the scope from a synchronous context, draining it to
    /// quiescence by driving the event loop.
    ///
    /// A scope with no live tasks closes without driving the loop.
    ///
    /// # Errors
    ///
    /// - Every unconsumed task failure: alone if there is one, as an
    ///   [`ErrorKind::Aggregate`] if there are several.
    /// - [`ErrorKind::ReentrantBlock`] when called inside a running loop
    ///   (use [`exit_async`](Self::exit_async) there).
    /// - [`ErrorKind::ScopeClosed`] when the scope already exited.
    pub fn exit(self) -> Result<()> {
        if self.core.phase.get() != ScopePhase::Open {
            return Err(Error::new(ErrorKind::ScopeClosed)
                .with_context("scope already draining or closed"));
        }
        if local::loop_is_running() {
            return Err(Error::new(ErrorKind::ReentrantBlock)
                .with_context("Scope::exit called inside a running event loop; use exit_async"));
        }

        self.core.begin_drain();
        if !self.core.all_terminal() {
            let driver = self.core.driver.clone();
            driver.block_on(DrainWait {
                core: Rc::clone(&self.core),
            })?;
        }
        self.core.finish_drain()
    }

    /// Exits the scope from an asynchronous context, suspending until the
    /// drain completes.
    ///
    /// Same error contract as [`exit`](Self::exit), minus the re-entrancy
    /// case.
    pub async fn exit_async(self) -> Result<()> {
        if self.core.phase.get() != ScopePhase::Open {
            return Err(Error::new(ErrorKind::ScopeClosed)
                .with_context("scope already draining or closed"));
        }
        self.core.begin_drain();
        DrainWait {
            core: Rc::clone(&self.core),
        }
        .await;
        self.core.finish_drain()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.core.id)
            .field("phase", &self.core.phase.get())
            .field("exit_mode", &self.core.exit_mode)
            .field("error_mode", &self.core.error_mode)
            .field("children", &self.core.children.borrow().len())
            .finish()
    }
}

/// Wraps a scheduled body: delivers cancellation at suspension points,
/// isolates panics, and reports the outcome into the result cell.
struct ScopedTask<T> {
    future: Pin<Box<dyn Future<Output = Result<T>>>>,
    cell: Rc<ResultCell<T>>,
    cancel: Rc<CancelCell>,
    core: Rc<ScopeCore>,
}

impl<T> Future for ScopedTask<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        // Cancellation is observed before the body runs again: a task
        // cancelled between suspensions terminates without further
        // progress, and its error arrives pre-consumed.
        if let Some(reason) = this.cancel.take_requested() {
            trace!(scope = %this.core.id, reason = %reason, "task cancelled");
            this.cell
                .complete(Outcome::Cancelled(reason))
                .expect("scoped task completed its result twice");
            return Poll::Ready(());
        }
        this.cancel.register_waker(cx.waker());

        let poll = catch_unwind(AssertUnwindSafe(|| this.future.as_mut().poll(cx)));
        match poll {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(Ok(value))) => {
                this.cell
                    .complete(Outcome::Ok(value))
                    .expect("scoped task completed its result twice");
                Poll::Ready(())
            }
            Ok(Poll::Ready(Err(error))) => {
                this.cell
                    .complete(Outcome::Err(error))
                    .expect("scoped task completed its result twice");
                this.core.on_child_failure();
                Poll::Ready(())
            }
            Err(payload) => {
                let payload = PanicPayload::from_unwind(payload.as_ref());
                this.cell
                    .complete(Outcome::Panicked(payload))
                    .expect("scoped task completed its result twice");
                this.core.on_child_failure();
                Poll::Ready(())
            }
        }
    }
}

/// Suspends until every child of the scope is terminal.
///
/// The child list is re-read on every poll, so tasks scheduled during the
/// drain still hold the scope open until they finish.
struct DrainWait {
    core: Rc<ScopeCore>,
}

impl Future for DrainWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let children = self.core.children.borrow();
        let mut all_terminal = true;
        for child in children.iter() {
            if !child.cell.is_terminal() {
                all_terminal = false;
                child.cell.add_waiter(cx.waker());
            }
        }
        if all_terminal {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
