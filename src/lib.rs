//! Tamer: context-adaptive structured concurrency for async Rust.
//!
//! # Overview
//!
//! Tamer lets a single asynchronous function definition be invoked from
//! three distinct calling contexts and adapts its execution to each one:
//!
//! - **Sync context**: the call blocks, drives a transient event loop to
//!   completion, and returns the value (or the error) inline.
//! - **Async context**: the call returns a lazy awaitable; nothing runs
//!   until the caller awaits it.
//! - **Scoped context**: the call is handed to an [`AsyncScope`], starts
//!   eagerly, and returns a [`DelayedResult`] that can be awaited,
//!   blocked on, or read after the scope closes.
//!
//! # Core Guarantees
//!
//! - **No orphan tasks**: every scheduled task is owned by a scope; scope
//!   exit drains all children to a terminal state before control continues
//! - **No silent failures**: every failing task's error is either consumed
//!   by an explicit waiter or re-raised (alone or aggregated) at scope exit
//! - **Cancel-correctness**: cancellation is a cooperative signal delivered
//!   at the next suspension point, never a silent drop
//! - **Deterministic boundaries**: nested scopes drain before the
//!   surrounding code resumes; outer tasks keep progressing during an
//!   inner drain because the event loop is shared
//!
//! # Module Structure
//!
//! - [`types`]: Core vocabulary (identifiers, outcomes, cancellation, policies)
//! - [`error`]: Error kinds and the crate [`Result`] alias
//! - [`runtime`]: The single-threaded cooperative event loop
//! - [`context`]: The call-context probe
//! - [`delayed`]: The single-assignment [`DelayedResult`] cell
//! - [`scope`]: [`AsyncScope`] configuration and the scope drain machinery
//! - [`tamed`]: The context-adaptive invocation adapter
//! - [`time`]: Sleep primitives driven by the event loop
//!
//! # Example
//!
//! ```
//! use tamer::{tamed, AsyncScope};
//! use std::time::Duration;
//!
//! let nap = tamed(|d: Duration| async move {
//!     tamer::time::sleep(d).await;
//!     Ok(42u32)
//! });
//!
//! // Sync context: blocks and returns the value.
//! assert_eq!(nap.call((Duration::from_millis(1),)).unwrap(), 42);
//!
//! // Scoped context: starts eagerly, result readable after the drain.
//! let scope = AsyncScope::new().enter();
//! let result = nap.call_scoped(&scope, (Duration::from_millis(1),)).unwrap();
//! scope.exit().unwrap();
//! assert_eq!(result.value().unwrap(), 42);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod context;
pub mod delayed;
pub mod error;
pub mod runtime;
pub mod scope;
pub mod tamed;
pub mod time;
pub mod tracing_compat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use context::{call_context, current_context, CallContext};
pub use delayed::DelayedResult;
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use runtime::EventLoop;
pub use scope::{AsyncScope, Scope, ScopePhase};
pub use tamed::{tamed, Invocation, Tamed, TamedBody};
pub use types::{
    join_outcomes, CancelKind, CancelReason, ErrorMode, ExitMode, Outcome, PanicPayload, ScopeId,
    TaskId,
};
