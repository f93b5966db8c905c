#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging from the environment.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// A shared, append-only event log for asserting completion order.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<&'static str>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: &'static str) {
        self.events.borrow_mut().push(event);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<&'static str> {
        self.events.borrow().clone()
    }
}

/// Milliseconds shorthand for sleep-heavy scenarios.
#[must_use]
pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
