//! Time provider abstraction for testable time-dependent logic
//!
//! Every persisted timestamp in the system is wall-clock UTC; the quota
//! reset boundary is the one place where tests must be able to move the
//! clock forward deterministically.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Abstraction over system time for testable time-dependent logic
pub trait TimeProvider: Send + Sync {
    /// Get the current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Production time provider using actual system time
#[derive(Default, Clone)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock time provider for deterministic testing
///
/// Not gated behind `cfg(test)` because the integration suites under
/// `tests/` drive quota resets through it.
#[derive(Clone)]
pub struct MockTimeProvider {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTimeProvider {
    /// Create a new mock time provider starting at the current time
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Utc::now())),
        }
    }

    /// Create a mock time provider starting at the given time
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: chrono::Duration) {
        let mut current = self.current.lock().unwrap();
        *current += duration;
    }

    /// Set the clock to an absolute time
    pub fn set(&self, time: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap();
        *current = time;
    }
}

impl TimeProvider for MockTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}
