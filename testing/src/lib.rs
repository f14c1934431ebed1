//! # Relay Testing
//!
//! Testing utilities for the relay workspace.
//!
//! This crate provides:
//! - Deterministic [`Clock`] implementations ([`FixedClock`], [`MockClock`])
//! - A log initialiser for tests that want to see `tracing` output
//!
//! ## Example
//!
//! ```
//! use relay_testing::MockClock;
//! use relay_core::store::ExpiringStore;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(MockClock::new());
//! let store: ExpiringStore<&str> = ExpiringStore::new("demo", clock.clone());
//!
//! store.put("token", "payload", chrono::Duration::hours(1));
//! clock.advance(chrono::Duration::hours(1));
//!
//! assert_eq!(store.get("token"), None);
//! ```

use chrono::{DateTime, Duration, Utc};
use relay_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use parking_lot::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use relay_testing::mocks::FixedClock;
    /// use relay_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
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

    /// Clock that only moves when told to.
    ///
    /// Shared behind an `Arc`, it lets a test expire tokens or roll a rate
    /// window over without sleeping.
    #[derive(Debug)]
    pub struct MockClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl MockClock {
        /// Create a mock clock starting at [`test_time`].
        #[must_use]
        pub fn new() -> Self {
            Self::starting_at(test_time())
        }

        /// Create a mock clock starting at `time`.
        #[must_use]
        pub fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward (or backward, for a negative duration).
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock();
            *time += by;
        }

        /// Jump to an absolute time.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock() = time;
        }
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock()
        }
    }

    /// The instant every test clock starts at: 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_735_689_600)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from many tests; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, MockClock, test_clock, test_time};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_mock_clock_advances() {
        let clock = MockClock::new();
        let start = clock.now();

        clock.advance(Duration::minutes(10));
        assert_eq!(clock.now() - start, Duration::minutes(10));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
