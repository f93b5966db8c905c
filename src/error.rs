//! Error types and error handling strategy.
//!
//! This module defines the core error type used throughout the runtime.
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Errors are cheaply clonable so one failure can be observed through a
//!   [`DelayedResult`](crate::delayed::DelayedResult) and aggregated at
//!   scope exit without ambiguity about ownership
//! - Panics inside scoped tasks are isolated and surfaced as
//!   `ErrorKind::Panicked`
//! - Contract violations (re-entrant blocking, double completion,
//!   scheduling onto a closed scope) fail fast with distinct kinds

use core::fmt;
use std::sync::Arc;

use crate::types::{CancelReason, PanicPayload};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Task failures ===
    /// Error returned by a tamed function's body.
    User,
    /// The task was cooperatively cancelled.
    Cancelled,
    /// The task body panicked.
    Panicked,

    // === Observation ===
    /// A delayed result was read before it was fulfilled.
    NotReady,
    /// Two or more unconsumed task errors raised together at scope exit.
    Aggregate,

    // === Runtime misuse ===
    /// A blocking drive was started while an event loop was already
    /// running on this thread.
    ReentrantBlock,
    /// A delayed result was fulfilled or failed twice.
    ResultAlreadySet,
    /// A task was scheduled onto a scope that has already closed.
    ScopeClosed,
}

impl ErrorKind {
    /// Returns true if this kind marks a runtime contract violation rather
    /// than a task failure.
    #[must_use]
    pub const fn is_misuse(self) -> bool {
        matches!(
            self,
            Self::ReentrantBlock | Self::ResultAlreadySet | Self::ScopeClosed
        )
    }
}

/// The main error type for tamer operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    related: Vec<Error>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
            related: Vec::new(),
        }
    }

    /// Creates a user error from an arbitrary error value.
    #[must_use]
    pub fn user(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::User).with_source(source)
    }

    /// Creates a user error carrying only a message.
    #[must_use]
    pub fn user_message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_context(message)
    }

    /// Creates a cancellation error from a structured reason.
    #[must_use]
    pub fn cancelled(reason: &CancelReason) -> Self {
        Self::new(ErrorKind::Cancelled).with_context(format!("{reason}"))
    }

    /// Creates a panic error from a caught payload.
    #[must_use]
    pub fn panicked(payload: &PanicPayload) -> Self {
        Self::new(ErrorKind::Panicked).with_context(payload.message().to_owned())
    }

    /// Creates a not-ready error for a pending delayed result.
    #[must_use]
    pub fn not_ready() -> Self {
        Self::new(ErrorKind::NotReady).with_context("delayed result is still pending")
    }

    /// Creates an aggregate error from two or more unconsumed failures.
    ///
    /// Callers with exactly one failure should raise it as-is; this
    /// constructor is for the genuinely plural case.
    #[must_use]
    pub fn aggregate(errors: Vec<Error>) -> Self {
        debug_assert!(errors.len() >= 2, "aggregate requires at least two errors");
        let mut error =
            Self::new(ErrorKind::Aggregate).with_context(format!("{} unconsumed task errors", errors.len()));
        error.related = errors;
        error
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error marks a runtime contract violation.
    #[must_use]
    pub const fn is_misuse(&self) -> bool {
        self.kind.is_misuse()
    }

    /// Returns the member errors of an aggregate (empty otherwise).
    #[must_use]
    pub fn related(&self) -> &[Error] {
        &self.related
    }

    /// Returns the context text attached to this error, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Adds deterministic context text to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        if self.kind == ErrorKind::Aggregate {
            for (i, e) in self.related.iter().enumerate() {
                write!(f, "\n  [{i}] {e}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Attach a context string on error.
    fn context(self, ctx: impl Into<String>) -> Result<T>;
    /// Attach context computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(ctx))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

/// A specialized Result type for tamer operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug)]
    struct Flat;

    impl fmt::Display for Flat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "tire went flat")
        }
    }

    impl std::error::Error for Flat {}

    #[test]
    fn user_error_carries_source() {
        let err = Error::user(Flat);
        assert_eq!(err.kind(), ErrorKind::User);
        assert!(err.source().is_some());
        assert_eq!(err.source().unwrap().to_string(), "tire went flat");
    }

    #[test]
    fn misuse_kinds_are_marked() {
        assert!(Error::new(ErrorKind::ReentrantBlock).is_misuse());
        assert!(Error::new(ErrorKind::ResultAlreadySet).is_misuse());
        assert!(Error::new(ErrorKind::ScopeClosed).is_misuse());
        assert!(!Error::user_message("x").is_misuse());
        assert!(!Error::not_ready().is_misuse());
    }

    #[test]
    fn cancelled_error_mentions_reason() {
        let err = Error::cancelled(&CancelReason::sibling_failed());
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("sibling failed"));
    }

    #[test]
    fn aggregate_keeps_members_in_order() {
        let err = Error::aggregate(vec![
            Error::user_message("first"),
            Error::user_message("second"),
        ]);
        assert_eq!(err.kind(), ErrorKind::Aggregate);
        assert_eq!(err.related().len(), 2);
        assert_eq!(err.related()[0].context(), Some("first"));
        assert_eq!(err.related()[1].context(), Some("second"));
    }

    #[test]
    fn aggregate_display_lists_members() {
        let err = Error::aggregate(vec![
            Error::user_message("first"),
            Error::user_message("second"),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 unconsumed task errors"));
        assert!(text.contains("[0] User: first"));
        assert!(text.contains("[1] User: second"));
    }

    #[test]
    fn context_extension_attaches_text() {
        let result: core::result::Result<(), Error> = Err(Error::not_ready());
        let err = result.context("while polling").unwrap_err();
        assert_eq!(err.context(), Some("while polling"));
        assert_eq!(err.kind(), ErrorKind::NotReady);
    }

    #[test]
    fn errors_clone_cheaply() {
        let err = Error::user(Flat);
        let clone = err.clone();
        assert_eq!(clone.kind(), ErrorKind::User);
        assert_eq!(clone.source().unwrap().to_string(), "tire went flat");
    }
}
