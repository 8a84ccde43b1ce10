//! The upcoming event client.
//!
//! [`UpcomingClient`] stores each event as a value whose TTL is the time left
//! until it fires, so the store itself is the scheduler: once `when` passes the
//! key is evicted and the event is no longer upcoming.
//!
//! Every successful [`put`](UpcomingClient::put) publishes the event's key on
//! the notification channel, which is what lets
//! [`wait`](UpcomingClient::wait) follow an event whose time is moved.
//!
//! # Example
//!
//! ```ignore
//! use upcoming_core::{Event, ListOptions, UpcomingClient, UpcomingConfig};
//! use chrono::{Duration, Utc};
//!
//! let client = UpcomingClient::new(store, &UpcomingConfig::default());
//!
//! client.put(&Event::new("calendar", "standup", "Standup", Utc::now() + Duration::minutes(10))).await?;
//!
//! for event in client.list(&ListOptions::default().within(std::time::Duration::from_secs(3600))).await? {
//!     println!("{}", event.title);
//! }
//! ```

use crate::config::UpcomingConfig;
use crate::environment::{Clock, SystemClock};
use crate::error::{Result, UpcomingError};
use crate::event::Event;
use crate::keys::KeySpace;
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Filters for [`UpcomingClient::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only list these sources. Empty lists every source.
    pub sources: Vec<String>,
    /// Only list events firing before `now + within`. `None` or zero disables
    /// the filter.
    pub within: Option<Duration>,
}

impl ListOptions {
    /// Restrict the listing to one more source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Restrict the listing to events firing within `within` from now.
    #[must_use]
    pub const fn within(mut self, within: Duration) -> Self {
        self.within = Some(within);
        self
    }
}

/// Sort events soonest first.
///
/// The sort is stable, so events with equal `when` keep their input order.
pub fn sort_by_when(events: &mut [Event]) {
    events.sort_by_key(|event| event.when);
}

/// Client for storing, listing, removing, and waiting on upcoming events.
///
/// Cheap to clone; clones share the store connection.
#[derive(Clone)]
pub struct UpcomingClient {
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) keys: KeySpace,
    pub(crate) clock: Arc<dyn Clock>,
}

impl UpcomingClient {
    /// Create a client over `store` using the prefix from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: &UpcomingConfig) -> Self {
        Self {
            store,
            keys: KeySpace::new(config.prefix.clone()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to compute TTLs, filters, and deadlines.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The key layout this client reads and writes.
    #[must_use]
    pub const fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    /// Current time according to the client's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Time left until `event` fires, clamped at zero.
    pub(crate) fn remaining(&self, event: &Event) -> Duration {
        (event.when - self.clock.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Store an event until it fires and notify waiters.
    ///
    /// Events whose `when` is not strictly in the future are not upcoming and
    /// are silently skipped.
    ///
    /// # Errors
    ///
    /// - [`UpcomingError::StoreUnavailable`] if the write fails.
    /// - [`UpcomingError::PublishFailed`] if the notification fails. The write
    ///   has already taken effect.
    pub async fn put(&self, event: &Event) -> Result<()> {
        let key = self.keys.key_for(&event.source, &event.source_id);

        let ttl = self.remaining(event);
        if ttl.is_zero() {
            tracing::debug!(key = %key, when = %event.when, "Event already fired, skipping write");
            return Ok(());
        }

        let value = event.encode().map_err(|e| UpcomingError::Encode {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        self.store.set(&key, value, ttl).await?;

        #[allow(clippy::cast_possible_truncation)]
        let ttl_ms = ttl.as_millis() as u64;
        tracing::debug!(key = %key, ttl_ms = ttl_ms, "Stored upcoming event");

        self.store
            .publish(self.keys.channel(), &key)
            .await
            .map_err(|cause| UpcomingError::PublishFailed {
                key: key.clone(),
                cause,
            })?;

        Ok(())
    }

    /// Fetch one event.
    ///
    /// # Errors
    ///
    /// - [`UpcomingError::NotFound`] if nothing is stored for the pair.
    /// - [`UpcomingError::Decode`] if the stored value is not an event.
    /// - [`UpcomingError::StoreUnavailable`] on store failure.
    pub async fn get(&self, source: &str, source_id: &str) -> Result<Event> {
        self.fetch(&self.keys.key_for(source, source_id)).await
    }

    pub(crate) async fn fetch(&self, key: &str) -> Result<Event> {
        let bytes = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| UpcomingError::NotFound {
                key: key.to_string(),
            })?;

        Event::decode(&bytes).map_err(|e| UpcomingError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Remove one event, reporting whether it was stored.
    ///
    /// # Errors
    ///
    /// Returns [`UpcomingError::StoreUnavailable`] if the delete fails.
    pub async fn remove(&self, source: &str, source_id: &str) -> Result<bool> {
        let key = self.keys.key_for(source, source_id);
        let existed = self.store.delete(&key).await?;

        tracing::debug!(key = %key, existed = existed, "Removed upcoming event");
        Ok(existed)
    }

    /// Remove every event of `source`, returning how many were deleted.
    ///
    /// Keys are deleted one at a time. Keys that expire between listing and
    /// deleting are not counted.
    ///
    /// # Errors
    ///
    /// - [`UpcomingError::StoreUnavailable`] if listing the keys fails.
    /// - [`UpcomingError::RemoveAllIncomplete`] if a delete fails; it carries
    ///   the count deleted so far. Nothing is rolled back.
    pub async fn remove_all(&self, source: &str) -> Result<u64> {
        let pattern = self.keys.list_pattern(Some(source));
        let keys = self.store.keys(&pattern).await?;

        let mut deleted = 0;
        for key in keys {
            match self.store.delete(&key).await {
                Ok(true) => deleted += 1,
                Ok(false) => {
                    tracing::trace!(key = %key, "Key vanished before delete");
                }
                Err(cause) => {
                    return Err(UpcomingError::RemoveAllIncomplete {
                        source_name: source.to_string(),
                        deleted,
                        key,
                        cause,
                    });
                }
            }
        }

        tracing::debug!(source = %source, deleted = deleted, "Removed all upcoming events for source");
        Ok(deleted)
    }

    /// List upcoming events, soonest first.
    ///
    /// Keys that vanish between enumeration and fetch (expiry or concurrent
    /// removal) are skipped, as are values that do not decode.
    ///
    /// # Errors
    ///
    /// Returns [`UpcomingError::StoreUnavailable`] if enumeration or fetch fails.
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Event>> {
        let mut events = Vec::new();

        if options.sources.is_empty() {
            events = self.scan(&self.keys.list_pattern(None)).await?;
        } else {
            let mut seen: Vec<&str> = Vec::with_capacity(options.sources.len());
            for source in &options.sources {
                if seen.contains(&source.as_str()) {
                    continue;
                }
                seen.push(source);
                events.extend(self.scan(&self.keys.list_pattern(Some(source))).await?);
            }
        }

        if let Some(within) = options.within.filter(|within| !within.is_zero()) {
            let horizon = chrono::Duration::from_std(within)
                .ok()
                .and_then(|within| self.clock.now().checked_add_signed(within));
            if let Some(horizon) = horizon {
                events.retain(|event| event.when < horizon);
            }
        }

        sort_by_when(&mut events);
        Ok(events)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<Event>> {
        let keys = self.store.keys(pattern).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values = self.store.multi_get(&keys).await?;

        let mut events = Vec::with_capacity(keys.len());
        for (key, value) in keys.iter().zip(values) {
            let Some(bytes) = value else {
                tracing::trace!(key = %key, "Key vanished before fetch");
                continue;
            };
            match Event::decode(&bytes) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping undecodable value");
                }
            }
        }

        Ok(events)
    }
}
