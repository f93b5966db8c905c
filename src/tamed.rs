//! The context-adaptive invocation adapter.
//!
//! [`tamed`] wraps an asynchronous function so that one definition behaves
//! correctly under three call contexts. The three modes intentionally
//! return three different kinds of value; callers pick the operation that
//! matches their context, or use [`Tamed::invoke`] to dispatch on the
//! [context probe](crate::context):
//!
//! | Caller state | Operation | Returns | Work starts |
//! |---|---|---|---|
//! | sync | [`Tamed::call`] | the value, blocking | immediately, runs to completion |
//! | async | [`Tamed::call_async`] | a lazy future | only when awaited |
//! | any, with a scope | [`Tamed::call_scoped`] | a [`DelayedResult`] | eagerly, owned by the scope |
//!
//! The wrapped function's own parameters are passed as a tuple; the scope
//! is an explicit argument of the adapter and is never seen by the body,
//! so it cannot collide with user parameters.
//!
//! # Eager vs. lazy
//!
//! Scope-scheduled calls are eager because the scope guarantees
//! completion. Async-context calls return an unstarted future because
//! nothing yet owns the work's lifetime; ownership transfers when the
//! caller awaits it.

use crate::context::{call_context, CallContext};
use crate::delayed::DelayedResult;
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::{local, EventLoop};
use crate::scope::Scope;
use crate::tracing_compat::trace;
use std::future::Future;

/// An asynchronous function body that a [`Tamed`] adapter can invoke.
///
/// Implemented for closures and functions of up to five arguments whose
/// future resolves to the crate [`Result`]. Arguments are passed as a
/// tuple: `()`, `(a,)`, `(a, b)`, and so on.
pub trait TamedBody<Args> {
    /// The success type the body resolves to.
    type Output;
    /// The future produced by one call of the body.
    type Future: Future<Output = Result<Self::Output>>;

    /// Produces the body's future without running any of it.
    fn call_body(&self, args: Args) -> Self::Future;
}

macro_rules! impl_tamed_body {
    ($($arg:ident),*) => {
        impl<Func, Fut, Out, $($arg),*> TamedBody<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Fut,
            Fut: Future<Output = Result<Out>>,
        {
            type Output = Out;
            type Future = Fut;

            #[allow(non_snake_case)]
            fn call_body(&self, ($($arg,)*): ($($arg,)*)) -> Fut {
                (self)($($arg),*)
            }
        }
    };
}

impl_tamed_body!();
impl_tamed_body!(A1);
impl_tamed_body!(A1, A2);
impl_tamed_body!(A1, A2, A3);
impl_tamed_body!(A1, A2, A3, A4);
impl_tamed_body!(A1, A2, A3, A4, A5);

/// Wraps an asynchronous function into a context-adaptive [`Tamed`]
/// adapter.
///
/// ```
/// use tamer::tamed;
///
/// let double = tamed(|x: u32| async move { Ok(x * 2) });
/// assert_eq!(double.call((21,)).unwrap(), 42);
/// ```
pub fn tamed<F>(body: F) -> Tamed<F> {
    Tamed { body }
}

/// A context-adaptive asynchronous function.
///
/// Created by [`tamed`]. Carries no per-call state; one adapter can be
/// invoked from any number of contexts concurrently.
#[derive(Clone)]
pub struct Tamed<F> {
    body: F,
}

impl<F> Tamed<F> {
    /// Invokes the body from a synchronous context: acquires a transient
    /// event loop, runs the body to completion on it, and returns its
    /// value or error inline.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::ReentrantBlock`] when called while an event loop is
    ///   already running on this thread (use
    ///   [`call_async`](Self::call_async) there).
    /// - Any error the body returns, raised at the call site.
    pub fn call<Args>(&self, args: Args) -> Result<F::Output>
    where
        F: TamedBody<Args>,
    {
        if local::loop_is_running() {
            return Err(Error::new(ErrorKind::ReentrantBlock).with_context(
                "tamed sync call inside a running event loop; use call_async",
            ));
        }
        trace!("tamed call: sync context");
        let driver = EventLoop::new();
        driver.block_on(self.body.call_body(args))?
    }

    /// Invokes the body from an asynchronous context: returns a lazy
    /// future. No work begins until the caller awaits it; errors raise at
    /// the await site.
    pub fn call_async<Args>(&self, args: Args) -> F::Future
    where
        F: TamedBody<Args>,
    {
        self.body.call_body(args)
    }

    /// Hands the body to `scope`: the task starts eagerly, and the
    /// returned [`DelayedResult`] can be awaited, blocked on, or read
    /// after the scope closes.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::ScopeClosed`] if the scope has already exited.
    pub fn call_scoped<Args>(
        &self,
        scope: &Scope,
        args: Args,
    ) -> Result<DelayedResult<F::Output>>
    where
        F: TamedBody<Args>,
        F::Future: 'static,
        F::Output: 'static,
    {
        trace!(scope = %scope.id(), "tamed call: scoped context");
        scope.schedule(self.body.call_body(args))
    }

    /// Probes the call context and dispatches to the matching operation,
    /// preserving the three distinct return shapes.
    ///
    /// The explicit `scope` argument dominates the probe, mirroring the
    /// dispatch table in the module docs.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::ScopeClosed`] if a scope was passed and has already
    /// exited. Failures of the body itself are carried inside the returned
    /// [`Invocation`] arm.
    pub fn invoke<Args>(
        &self,
        scope: Option<&Scope>,
        args: Args,
    ) -> Result<Invocation<F::Output, F::Future>>
    where
        F: TamedBody<Args>,
        F::Future: 'static,
        F::Output: 'static,
    {
        match call_context(scope) {
            CallContext::Scoped => {
                let scope = scope.expect("scoped context implies a scope argument");
                Ok(Invocation::Scheduled(self.call_scoped(scope, args)?))
            }
            CallContext::Async => Ok(Invocation::Deferred(self.call_async(args))),
            CallContext::Sync => Ok(Invocation::Value(self.call(args))),
        }
    }
}

impl<F> std::fmt::Debug for Tamed<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tamed").finish_non_exhaustive()
    }
}

/// The three return shapes of a probe-dispatched tamed call.
#[must_use]
pub enum Invocation<T, Fut> {
    /// Sync context: the body already ran to completion.
    Value(Result<T>),
    /// Async context: a lazy future; nothing runs until it is awaited.
    Deferred(Fut),
    /// Scoped context: the body is running eagerly under the scope.
    Scheduled(DelayedResult<T>),
}

impl<T, Fut> Invocation<T, Fut> {
    /// Returns the context this invocation was dispatched for.
    #[must_use]
    pub const fn context(&self) -> CallContext {
        match self {
            Self::Value(_) => CallContext::Sync,
            Self::Deferred(_) => CallContext::Async,
            Self::Scheduled(_) => CallContext::Scoped,
        }
    }
}

impl<T, Fut> std::fmt::Debug for Invocation<T, Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invocation::{}", self.context())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::AsyncScope;
    use crate::test_utils::init_test_logging;
    use crate::time::sleep;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn sync_call_blocks_and_returns_the_value() {
        init_test_logging();
        let nap = tamed(|d: Duration| async move {
            sleep(d).await;
            Ok(42u32)
        });
        let started = std::time::Instant::now();
        assert_eq!(nap.call((Duration::from_millis(5),)).unwrap(), 42);
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn sync_call_raises_user_errors_inline() {
        let fail = tamed(|| async { Err::<u32, _>(Error::user_message("boom")) });
        let err = fail.call(()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::User);
    }

    #[test]
    fn async_call_is_lazy_until_awaited() {
        let ran = Rc::new(Cell::new(false));
        let ran_body = Rc::clone(&ran);
        let mark = tamed(move || {
            let ran = Rc::clone(&ran_body);
            async move {
                ran.set(true);
                Ok(1u32)
            }
        });

        let future = mark.call_async(());
        assert!(!ran.get(), "nothing runs until the handle is awaited");

        let value = EventLoop::new().block_on(future).unwrap().unwrap();
        assert_eq!(value, 1);
        assert!(ran.get());
    }

    #[test]
    fn sync_call_inside_loop_is_misuse() {
        let noop = tamed(|| async { Ok(()) });
        let err = EventLoop::new()
            .block_on(async move { noop.call(()).unwrap_err() })
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ReentrantBlock);
    }

    #[test]
    fn same_value_across_all_three_contexts() {
        let answer = tamed(|| async { Ok(42u32) });

        // Sync.
        assert_eq!(answer.call(()).unwrap(), 42);

        // Async.
        let from_async = EventLoop::new()
            .block_on(answer.call_async(()))
            .unwrap()
            .unwrap();
        assert_eq!(from_async, 42);

        // Scoped.
        let scope = AsyncScope::new().enter();
        let result = answer.call_scoped(&scope, ()).unwrap();
        scope.exit().unwrap();
        assert_eq!(result.value().unwrap(), 42);
    }

    #[test]
    fn invoke_dispatches_on_context() {
        init_test_logging();
        let answer = tamed(|| async { Ok(7u32) });

        // Sync context: Value.
        match answer.invoke(None, ()).unwrap() {
            Invocation::Value(value) => assert_eq!(value.unwrap(), 7),
            other => panic!("expected Value, got {other:?}"),
        }

        // Scope argument dominates: Scheduled.
        let scope = AsyncScope::new().enter();
        let invocation = answer.invoke(Some(&scope), ()).unwrap();
        assert_eq!(invocation.context(), CallContext::Scoped);
        let Invocation::Scheduled(result) = invocation else {
            panic!("expected Scheduled");
        };
        scope.exit().unwrap();
        assert_eq!(result.value().unwrap(), 7);

        // Async context: Deferred.
        let answer_for_loop = answer.clone();
        let value = EventLoop::new()
            .block_on(async move {
                match answer_for_loop.invoke(None, ()).unwrap() {
                    Invocation::Deferred(future) => future.await,
                    other => panic!("expected Deferred, got {other:?}"),
                }
            })
            .unwrap()
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn adapters_take_multiple_arguments_as_tuples() {
        let add = tamed(|a: u32, b: u32, c: u32| async move { Ok(a + b + c) });
        assert_eq!(add.call((1, 2, 3)).unwrap(), 6);
    }
}
