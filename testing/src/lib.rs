//! # Shopwire Testing
//!
//! Test doubles for the shopwire choreography:
//!
//! - [`broker::InMemoryBroker`]: the [`BrokerChannel`](shopwire_core::broker::BrokerChannel)
//!   port implemented in-process with real topic routing, manual
//!   acknowledgement and dead-letter semantics
//! - [`mocks::FixedClock`]: deterministic time
//! - [`init_test_tracing`]: opt-in log output while debugging a test
//!
//! ## Example
//!
//! ```
//! use shopwire_core::broker::BrokerChannel;
//! use shopwire_core::topology::{ExchangeSpec, Topology, USER_EXCHANGE, USER_CREATED_KEY};
//! use shopwire_testing::broker::InMemoryBroker;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = InMemoryBroker::new();
//! Topology::new()
//!     .with_dead_lettering()
//!     .exchange(ExchangeSpec::topic(USER_EXCHANGE))
//!     .consuming_queue("cart_user_created_queue", USER_EXCHANGE, USER_CREATED_KEY)
//!     .declare(&broker)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod broker;

/// Mock implementations for deterministic tests.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use shopwire_core::clock::Clock;

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making timestamp assertions
    /// reproducible.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC).
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a tracing subscriber honoring `RUST_LOG`, once per process.
///
/// Safe to call from every test; repeated installation is ignored.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use broker::InMemoryBroker;
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use shopwire_core::clock::Clock;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }
}
