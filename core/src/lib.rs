//! # Upcoming Core
//!
//! Core types, the backing store contract, and the client for tracking
//! upcoming timed events.
//!
//! ## Core Concepts
//!
//! - **Event**: an upcoming record identified by `(source, source_id)` that fires at `when`
//! - **Key space**: `{prefix}/{source}/{source_id}` keys plus a `{prefix}/channel` channel
//! - **TTL as scheduler**: an event is stored with a TTL equal to the time left until
//!   it fires; the store evicts it when it fires
//! - **Notifications**: every write publishes its key so waiters can follow updates
//! - **Wait**: block until an event fires, re-arming when it is moved
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐    ┌────────────────┐    ┌────────────────────┐
//! │  CLI /     │───►│ UpcomingClient │───►│  KeyValueStore     │
//! │  callers   │    │ put/list/wait  │    │  (Redis, memory)   │
//! └────────────┘    └────────────────┘    └────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use upcoming_core::{Event, UpcomingClient, UpcomingConfig};
//! use chrono::{Duration, Utc};
//!
//! let client = UpcomingClient::new(store, &UpcomingConfig::default());
//! let event = Event::new("calendar", "standup", "Standup", Utc::now() + Duration::seconds(30));
//!
//! client.put(&event).await?;
//! let outcome = client.wait(event, tokio::signal::ctrl_c()).await?;
//! println!("{} fired", outcome.event().title);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod humanize;
pub mod keys;
pub mod store;
pub mod wait;

pub use client::{ListOptions, UpcomingClient, sort_by_when};
pub use config::UpcomingConfig;
pub use error::{Result, UpcomingError};
pub use event::{CodecError, Event};
pub use format::format_event;
pub use humanize::{HumanizeOptions, humanize_duration, humanize_duration_with};
pub use keys::KeySpace;
pub use store::{KeyValueStore, MessageStream, StoreError, StoreFuture};
pub use wait::WaitOutcome;

/// Environment module - Injected dependencies
///
/// Time is abstracted behind [`Clock`](environment::Clock) so TTLs, list
/// horizons, and wait deadlines can be driven deterministically in tests.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use upcoming_core::environment::{Clock, SystemClock};
    ///
    /// let before = chrono::Utc::now();
    /// assert!(SystemClock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
