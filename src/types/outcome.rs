//! Four-valued outcome type with severity lattice.
//!
//! The outcome type represents the terminal result of a scoped task:
//!
//! - `Ok(T)`: Success with value
//! - `Err(Error)`: The task body returned an error
//! - `Cancelled(CancelReason)`: The task was cooperatively cancelled
//! - `Panicked(PanicPayload)`: The task body panicked
//!
//! These form a severity lattice: `Ok < Err < Cancelled < Panicked`.
//! When two outcomes must be combined, the worse outcome wins.

use super::cancel::CancelReason;
use crate::error::Error;
use core::fmt;

/// Payload from a caught panic.
///
/// This wraps the panic message for safe transport out of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicPayload {
    message: String,
}

impl PanicPayload {
    /// Creates a new panic payload with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extracts a message from a `catch_unwind` payload.
    ///
    /// Panic payloads are almost always `&str` or `String`; anything else
    /// is reported as opaque.
    #[must_use]
    pub fn from_unwind(payload: &(dyn std::any::Any + Send)) -> Self {
        if let Some(s) = payload.downcast_ref::<&str>() {
            Self::new(*s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            Self::new(s.clone())
        } else {
            Self::new("opaque panic payload")
        }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

/// The four-valued outcome of a scoped task.
///
/// Forms a severity lattice where worse outcomes dominate:
/// `Ok < Err < Cancelled < Panicked`
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// Success with a value.
    Ok(T),
    /// The task body returned an error.
    Err(Error),
    /// The task was cooperatively cancelled.
    Cancelled(CancelReason),
    /// The task body panicked.
    Panicked(PanicPayload),
}

impl<T> Outcome<T> {
    /// Returns the severity level of this outcome (0 = Ok, 3 = Panicked).
    #[must_use]
    pub const fn severity(&self) -> u8 {
        match self {
            Self::Ok(_) => 0,
            Self::Err(_) => 1,
            Self::Cancelled(_) => 2,
            Self::Panicked(_) => 3,
        }
    }

    /// Returns true if this outcome is `Ok`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns true if this outcome is `Err`.
    #[must_use]
    pub const fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    /// Returns true if this outcome is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns true if this outcome is `Panicked`.
    #[must_use]
    pub const fn is_panicked(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    /// Returns true if this outcome is a failure that participates in
    /// end-of-scope aggregation when left unobserved.
    ///
    /// Cancellation never aggregates: a cancelled task's error is consumed
    /// by the cancellation mechanism itself.
    #[must_use]
    pub const fn is_aggregatable_failure(&self) -> bool {
        matches!(self, Self::Err(_) | Self::Panicked(_))
    }

    /// Converts this outcome to the crate `Result`, with cancellation and
    /// panic materialized as errors of their distinguished kinds.
    pub fn into_result(self) -> crate::error::Result<T> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Err(e) => Err(e),
            Self::Cancelled(r) => Err(Error::cancelled(&r)),
            Self::Panicked(p) => Err(Error::panicked(&p)),
        }
    }

    /// Materializes the failure carried by this outcome, if any.
    #[must_use]
    pub fn to_error(&self) -> Option<Error> {
        match self {
            Self::Ok(_) => None,
            Self::Err(e) => Some(e.clone()),
            Self::Cancelled(r) => Some(Error::cancelled(r)),
            Self::Panicked(p) => Some(Error::panicked(p)),
        }
    }

    /// Maps the success value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Ok(v) => Outcome::Ok(f(v)),
            Self::Err(e) => Outcome::Err(e),
            Self::Cancelled(r) => Outcome::Cancelled(r),
            Self::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Returns the success value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is not `Ok`.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Ok(v) => v,
            Self::Err(e) => panic!("called `Outcome::unwrap()` on an `Err` value: {e}"),
            Self::Cancelled(r) => {
                panic!("called `Outcome::unwrap()` on a `Cancelled` value: {r}")
            }
            Self::Panicked(p) => panic!("called `Outcome::unwrap()` on a `Panicked` value: {p}"),
        }
    }

    /// Returns the success value or a default.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Ok(v) => v,
            _ => default,
        }
    }
}

impl<T> From<crate::error::Result<T>> for Outcome<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(v) => Self::Ok(v),
            Err(e) => Self::Err(e),
        }
    }
}

/// Compares two outcomes by severity and returns the worse one.
///
/// This implements the lattice join operation. When severities are equal
/// the first argument wins.
pub fn join_outcomes<T>(a: Outcome<T>, b: Outcome<T>) -> Outcome<T> {
    if a.severity() >= b.severity() {
        a
    } else {
        b
    }
}
