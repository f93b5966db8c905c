//! Sleep primitives for delaying execution.
//!
//! [`sleep`] and [`sleep_until`] are the runtime's only time-based
//! suspension points. A zero-duration sleep still suspends exactly once,
//! which makes it usable as a cooperative yield.

pub mod sleep;

pub use sleep::{sleep, sleep_until, Sleep};
