//! Cancellation reason and kind types.
//!
//! Cancellation is a first-class cooperative signal, not a silent drop.
//! This module defines the types that describe why cancellation occurred.

use core::fmt;

/// The kind of cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CancelKind {
    /// Explicit cancellation requested by user code.
    User,
    /// Cancellation because a sibling task in the same scope failed
    /// (`ErrorMode::Cancel`).
    FailFast,
    /// Cancellation because the owning scope exited with
    /// `ExitMode::Cancel`.
    ScopeExit,
}

impl CancelKind {
    /// Returns the severity of this cancellation kind.
    ///
    /// Higher severity cancellations take precedence when strengthening.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::User => 0,
            Self::FailFast => 1,
            Self::ScopeExit => 2,
        }
    }
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::FailFast => write!(f, "sibling failed"),
            Self::ScopeExit => write!(f, "scope exit"),
        }
    }
}

/// The reason for a cancellation, including kind and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// Optional human-readable message (static for determinism).
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a new cancellation reason with the given kind.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user cancellation reason with a message.
    #[must_use]
    pub const fn user(message: &'static str) -> Self {
        Self {
            kind: CancelKind::User,
            message: Some(message),
        }
    }

    /// Creates a fail-fast cancellation reason (sibling failed).
    #[must_use]
    pub const fn sibling_failed() -> Self {
        Self::new(CancelKind::FailFast)
    }

    /// Creates a scope-exit cancellation reason (`ExitMode::Cancel`).
    #[must_use]
    pub const fn scope_exit() -> Self {
        Self::new(CancelKind::ScopeExit)
    }

    /// Strengthens this reason with another, keeping the more severe one.
    ///
    /// Returns `true` if the reason was changed.
    pub fn strengthen(&mut self, other: &Self) -> bool {
        if other.kind > self.kind {
            self.kind = other.kind;
            self.message = other.message;
            return true;
        }

        if other.kind < self.kind {
            return false;
        }

        match (self.message, other.message) {
            (None, Some(msg)) => {
                self.message = Some(msg);
                true
            }
            (Some(current), Some(candidate)) if candidate < current => {
                self.message = Some(candidate);
                true
            }
            _ => false,
        }
    }

    /// Returns the kind of this cancellation reason.
    #[must_use]
    pub const fn kind(&self) -> CancelKind {
        self.kind
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new(CancelKind::User)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(CancelKind::User.severity() < CancelKind::FailFast.severity());
        assert!(CancelKind::FailFast.severity() < CancelKind::ScopeExit.severity());
    }

    #[test]
    fn strengthen_takes_more_severe() {
        let mut reason = CancelReason::new(CancelKind::User);
        assert!(reason.strengthen(&CancelReason::sibling_failed()));
        assert_eq!(reason.kind, CancelKind::FailFast);

        assert!(reason.strengthen(&CancelReason::scope_exit()));
        assert_eq!(reason.kind, CancelKind::ScopeExit);

        // Less severe should not change.
        assert!(!reason.strengthen(&CancelReason::sibling_failed()));
        assert_eq!(reason.kind, CancelKind::ScopeExit);
    }

    #[test]
    fn strengthen_is_idempotent() {
        let mut reason = CancelReason::sibling_failed();
        assert!(!reason.strengthen(&CancelReason::sibling_failed()));
        assert_eq!(reason.kind, CancelKind::FailFast);
    }

    #[test]
    fn strengthen_same_kind_picks_deterministic_message() {
        let mut reason = CancelReason::user("b");
        assert!(reason.strengthen(&CancelReason::user("a")));
        assert_eq!(reason.kind, CancelKind::User);
        assert_eq!(reason.message, Some("a"));
    }

    #[test]
    fn strengthen_resets_message_when_kind_increases() {
        let mut reason = CancelReason::user("please stop");
        assert!(reason.strengthen(&CancelReason::scope_exit()));
        assert_eq!(reason.kind, CancelKind::ScopeExit);
        assert_eq!(reason.message, None);
    }
}
