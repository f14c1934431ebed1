//! # Relay Core
//!
//! The ephemeral keyed state primitives shared by the relay.
//!
//! This crate provides:
//! - [`environment::Clock`]: injectable time source
//! - [`store::ExpiringStore`]: a sharded, concurrent map whose entries carry an
//!   absolute expiry
//! - [`sweeper::Sweeper`]: a background task that evicts expired entries to
//!   keep memory bounded
//!
//! ## Example
//!
//! ```
//! use relay_core::environment::SystemClock;
//! use relay_core::store::ExpiringStore;
//! use std::sync::Arc;
//!
//! let store: ExpiringStore<u32> = ExpiringStore::new("example", Arc::new(SystemClock));
//! store.put("answer", 42, chrono::Duration::minutes(5));
//! assert_eq!(store.get("answer"), Some(42));
//! assert_eq!(store.take("answer"), Some(42));
//! assert_eq!(store.get("answer"), None);
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod store;
pub mod sweeper;

pub use store::{Entry, ExpiringStore};
pub use sweeper::{Sweepable, Sweeper};

/// Environment module - injected dependencies
///
/// All time reads in the relay go through [`environment::Clock`] so that
/// expiry and window rollover can be tested without sleeping.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use relay_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock backed by [`Utc::now`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
