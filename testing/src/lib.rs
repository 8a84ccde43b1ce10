//! # Upcoming Testing
//!
//! Testing utilities for code built on `upcoming-core`.
//!
//! This crate provides:
//! - [`InMemoryStore`]: a [`KeyValueStore`](upcoming_core::store::KeyValueStore)
//!   with real TTL expiry and broadcast pub/sub, plus fault injection
//! - [`FixedClock`]: deterministic time that never moves
//! - [`TokioClock`]: wall time that follows tokio's (pausable) clock
//! - [`client`]: an [`UpcomingClient`] wired to both
//!
//! ## Example
//!
//! ```ignore
//! use upcoming_testing::{client, test_time};
//!
//! #[tokio::test(start_paused = true)]
//! async fn event_fires() {
//!     let (client, store) = client();
//!     let event = Event::new("test", "1", "Ping", test_time() + Duration::seconds(5));
//!     client.put(&event).await.unwrap();
//!
//!     tokio::time::advance(std::time::Duration::from_secs(5)).await;
//!     assert!(store.is_empty());
//! }
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;
use upcoming_core::environment::Clock;
use upcoming_core::{UpcomingClient, UpcomingConfig};

pub mod store;

pub use store::InMemoryStore;

/// Mock clocks for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use tokio::time::Instant;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use upcoming_testing::mocks::FixedClock;
    /// use upcoming_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
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

    /// Clock anchored at a wall time and advanced by tokio's clock.
    ///
    /// Under `#[tokio::test(start_paused = true)]` both the store's TTLs and
    /// this clock move only when the test advances time, so timestamps and
    /// deadlines stay in lockstep.
    #[derive(Debug, Clone)]
    pub struct TokioClock {
        origin: DateTime<Utc>,
        started: Instant,
    }

    impl TokioClock {
        /// Start the clock at `origin`, now.
        #[must_use]
        pub fn starting_at(origin: DateTime<Utc>) -> Self {
            Self {
                origin,
                started: Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = chrono::Duration::from_std(self.started.elapsed())
                .unwrap_or(chrono::Duration::MAX);
            self.origin
                .checked_add_signed(elapsed)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        }
    }
}

/// Canonical test time (2025-01-01 00:00:00 UTC).
#[must_use]
pub fn test_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(test_time())
}

/// A client over a fresh [`InMemoryStore`] whose clock starts at
/// [`test_time`] and follows tokio's clock.
#[must_use]
pub fn client() -> (UpcomingClient, InMemoryStore) {
    client_with_clock(Arc::new(TokioClock::starting_at(test_time())))
}

/// A client over a fresh [`InMemoryStore`] using `clock`.
#[must_use]
pub fn client_with_clock(clock: Arc<dyn Clock>) -> (UpcomingClient, InMemoryStore) {
    let store = InMemoryStore::new();
    let client = UpcomingClient::new(Arc::new(store.clone()), &UpcomingConfig::default())
        .with_clock(clock);
    (client, store)
}

// Re-export commonly used items
pub use mocks::{FixedClock, TokioClock};

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

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::starting_at(test_time());
        assert_eq!(clock.now(), test_time());

        tokio::time::advance(std::time::Duration::from_secs(90)).await;
        assert_eq!(clock.now(), test_time() + chrono::Duration::seconds(90));
    }
}
