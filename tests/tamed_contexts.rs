//! The three calling contexts of a tamed function, end to end.

mod common;

use common::*;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;
use tamer::time::sleep;
use tamer::{tamed, AsyncScope, CallContext, EventLoop, Invocation};

/// Tamed functions run synchronously when called directly.
#[test]
fn synchronous_call_blocks_for_the_duration() {
    init_test_logging();
    let nap = tamed(|d: std::time::Duration| async move {
        sleep(d).await;
        Ok(())
    });

    let tic = Instant::now();
    nap.call((ms(10),)).unwrap();
    assert!(tic.elapsed() >= ms(10));
}

/// Tamed functions run asynchronously when called from an async context:
/// the caller's code after the call site runs before the body.
#[test]
fn asynchronous_call_runs_at_the_await_site() {
    init_test_logging();
    let shared = Rc::new(Cell::new(0u32));

    let body_shared = Rc::clone(&shared);
    let one = tamed(move || {
        let shared = Rc::clone(&body_shared);
        async move {
            shared.set(1);
            Ok(())
        }
    });

    let race_shared = Rc::clone(&shared);
    EventLoop::new()
        .block_on(async move {
            let handle = one.call_async(());
            race_shared.set(2);
            handle.await.unwrap();
        })
        .unwrap();

    assert_eq!(shared.get(), 1);
}

/// A scoped call returns before the body makes any progress: the work is
/// eager in ownership, not in execution.
#[test]
fn scoped_call_returns_before_the_body_starts() {
    init_test_logging();
    let started = Rc::new(Cell::new(false));

    let body_started = Rc::clone(&started);
    let task = tamed(move || {
        let started = Rc::clone(&body_started);
        async move {
            started.set(true);
            Ok(())
        }
    });

    let scope = AsyncScope::new().enter();
    let result = task.call_scoped(&scope, ()).unwrap();
    assert!(!started.get(), "call site must return before the body runs");

    scope.exit().unwrap();
    assert!(started.get());
    result.value().unwrap();
}

/// From an async context a scoped body progresses at most to its first
/// suspension per scheduling quantum.
#[test]
fn scoped_call_from_async_context_starts_eagerly() {
    init_test_logging();
    let started = Rc::new(Cell::new(false));
    let finished = Rc::new(Cell::new(false));

    let body_started = Rc::clone(&started);
    let body_finished = Rc::clone(&finished);
    let task = tamed(move || {
        let started = Rc::clone(&body_started);
        let finished = Rc::clone(&body_finished);
        async move {
            started.set(true);
            sleep(ms(5)).await;
            finished.set(true);
            Ok(())
        }
    });

    let probe_started = Rc::clone(&started);
    let probe_finished = Rc::clone(&finished);
    EventLoop::new()
        .block_on(async move {
            let scope = AsyncScope::new().enter();
            task.call_scoped(&scope, ()).unwrap();
            assert!(!probe_started.get());

            // One scheduling quantum: the body reaches its first suspension.
            sleep(std::time::Duration::ZERO).await;
            assert!(probe_started.get());
            assert!(!probe_finished.get());

            scope.exit_async().await.unwrap();
            assert!(probe_finished.get());
        })
        .unwrap();
}

/// The probe classifies all three contexts.
#[test]
fn probe_tracks_the_calling_context() {
    init_test_logging();
    assert_eq!(tamer::current_context(), CallContext::Sync);

    let observed = EventLoop::new()
        .block_on(async { tamer::current_context() })
        .unwrap();
    assert_eq!(observed, CallContext::Async);

    let scope = AsyncScope::new().enter();
    assert_eq!(tamer::call_context(Some(&scope)), CallContext::Scoped);
    scope.exit().unwrap();
}

/// One definition, three contexts, one value.
#[test]
fn value_is_identical_across_contexts() {
    init_test_logging();
    let answer = tamed(|| async {
        sleep(ms(1)).await;
        Ok(42u32)
    });

    assert_eq!(answer.call(()).unwrap(), 42);

    let awaited = EventLoop::new()
        .block_on(answer.call_async(()))
        .unwrap()
        .unwrap();
    assert_eq!(awaited, 42);

    let scope = AsyncScope::new().enter();
    let scheduled = answer.call_scoped(&scope, ()).unwrap();
    scope.exit().unwrap();
    assert_eq!(scheduled.value().unwrap(), 42);
}

/// Probe-driven dispatch preserves the three return shapes.
#[test]
fn invoke_returns_the_shape_for_the_context() {
    init_test_logging();
    let answer = tamed(|| async { Ok(3u32) });

    let Invocation::Value(value) = answer.invoke(None, ()).unwrap() else {
        panic!("sync context must yield a Value");
    };
    assert_eq!(value.unwrap(), 3);

    let scope = AsyncScope::new().enter();
    let Invocation::Scheduled(result) = answer.invoke(Some(&scope), ()).unwrap() else {
        panic!("a scope argument must yield a Scheduled result");
    };
    scope.exit().unwrap();
    assert_eq!(result.value().unwrap(), 3);
}
