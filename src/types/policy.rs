//! Scope boundary policies.
//!
//! A scope is configured by two orthogonal policies: what happens to
//! still-running tasks when the scope exits ([`ExitMode`]), and how the
//! scope reacts when one of its tasks fails mid-flight ([`ErrorMode`]).

use core::fmt;

/// What the scope does with still-running tasks at exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExitMode {
    /// Wait for all owned tasks to finish naturally.
    #[default]
    Wait,
    /// Cancel all still-running owned tasks, then wait for them to observe
    /// the cancellation.
    Cancel,
}

impl fmt::Display for ExitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wait => write!(f, "wait"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

/// How the scope reacts when an owned task fails with an unconsumed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorMode {
    /// Cancel all sibling tasks in the same scope.
    #[default]
    Cancel,
    /// Leave siblings undisturbed; the error is carried until scope exit.
    Ignore,
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancel => write!(f, "cancel"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}
