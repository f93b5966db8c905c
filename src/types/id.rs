//! Identifier types for runtime entities.
//!
//! These wrap plain counters with type safety. A single flow of control is
//! driven by one single-threaded event loop, so identifiers only need to be
//! unique, not generation-guarded.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static SCOPE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A unique identifier for a task scheduled on an event loop.
///
/// Task 0 is reserved for the loop driver itself: the root future handed to
/// [`EventLoop::block_on`](crate::runtime::EventLoop::block_on) wakes and
/// sleeps under this identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    /// The identifier of the loop driver (the `block_on` root future).
    pub const DRIVER: Self = Self(0);

    /// Creates a task ID from a raw value (internal use).
    #[must_use]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns true if this is the driver pseudo-task.
    #[must_use]
    pub const fn is_driver(self) -> bool {
        self.0 == 0
    }

    /// Creates a task ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_driver() {
            write!(f, "driver")
        } else {
            write!(f, "T{}", self.0)
        }
    }
}

/// A unique identifier for a scope.
///
/// Scope identifiers are process-global so that nested scopes on the same
/// thread, and scopes on different threads, never collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Allocates the next scope identifier.
    #[must_use]
    pub(crate) fn next() -> Self {
        Self(SCOPE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a scope ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({})", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}
