//! Time abstraction for testable timestamps.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time so handlers can be tested deterministically.
///
/// Production code injects [`SystemClock`]; tests inject the fixed clock
/// from the testing crate.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
