//! # EventHub Testing
//!
//! Testing utilities shared by the EventHub crates:
//! - Deterministic clocks ([`FixedClock`], [`test_clock`])
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//! - Tracing output for tests that want to see the pipeline's logs
//!
//! ## Example
//!
//! ```ignore
//! use eventhub_testing::{test_clock, ReducerTest};
//!
//! ReducerTest::new(BookingReducer::new())
//!     .with_env(env_with(test_clock()))
//!     .given_state(pending_booking())
//!     .when_action(BookingAction::PaymentFailed { reason: "declined".into() })
//!     .then_state(|booking| assert_eq!(booking.payment_status, PaymentStatus::Failed))
//!     .run();
//! ```


use chrono::{DateTime, Duration, TimeZone, Utc};
use eventhub_core::environment::Clock;
use std::sync::Mutex;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Duration, Mutex, Utc};

    /// Clock for deterministic tests.
    ///
    /// Returns the same instant until explicitly advanced.
    ///
    /// # Example
    ///
    /// ```
    /// use eventhub_testing::mocks::FixedClock;
    /// use eventhub_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let before = clock.now();
    /// clock.advance(Duration::days(1));
    /// assert_eq!(clock.now() - before, Duration::days(1));
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock at the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward (or backward, for negative durations)
        pub fn advance(&self, by: Duration) {
            if let Ok(mut time) = self.time.lock() {
                *time += by;
            }
        }

        /// Jump to an absolute instant
        pub fn set(&self, to: DateTime<Utc>) {
            if let Ok(mut time) = self.time.lock() {
                *time = to;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }
}

/// Default fixed clock for tests: 2025-01-01 00:00:00 UTC.
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    )
}

/// Install a compact tracing subscriber for the current test binary.
///
/// Safe to call from every test; only the first call installs anything.
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
pub use mocks::FixedClock;
pub use reducer_test::{assertions, ReducerTest};
