//! The call-context probe.
//!
//! A tamed function adapts to the concurrency context of its caller. The
//! probe inspects ambient execution state and classifies the call site:
//!
//! - [`CallContext::Scoped`] when the caller passed an explicit scope;
//!   this is never inferred ambiently;
//! - [`CallContext::Async`] when an event loop is actively driving the
//!   current call chain (suspension is possible here);
//! - [`CallContext::Sync`] otherwise. In this context the adapter creates
//!   and drives a transient event loop itself.

use crate::runtime::local;
use crate::scope::Scope;
use core::fmt;

/// The concurrency context of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallContext {
    /// No event loop is driving this thread; blocking is permitted.
    Sync,
    /// An event loop is driving this thread; suspension is possible and
    /// blocking is a contract violation.
    Async,
    /// The caller passed an explicit scope to schedule onto.
    Scoped,
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Async => write!(f, "async"),
            Self::Scoped => write!(f, "scoped"),
        }
    }
}

/// Classifies the current call site given an optional explicit scope.
///
/// The scope argument dominates: passing a scope always selects
/// [`CallContext::Scoped`], regardless of the ambient loop state.
#[must_use]
pub fn call_context(scope: Option<&Scope>) -> CallContext {
    if scope.is_some() {
        CallContext::Scoped
    } else {
        current_context()
    }
}

/// Classifies the ambient context of the current thread.
///
/// Returns [`CallContext::Async`] while an event loop is driving this
/// thread and [`CallContext::Sync`] otherwise; [`CallContext::Scoped`] is
/// only ever selected by an explicit scope argument.
#[must_use]
pub fn current_context() -> CallContext {
    if local::loop_is_running() {
        CallContext::Async
    } else {
        CallContext::Sync
    }
}
