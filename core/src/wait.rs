//! Waiting for an event to fire while following external updates.
//!
//! # State machine
//!
//! ```text
//!                    ┌──────────────────────────────┐
//!                    │ notification for our key     │
//!                    │ → re-fetch, re-arm deadline  │
//!                    ▼                              │
//!   subscribe ──► ┌───────┐ ─────────────────────────┘
//!                 │ Armed │ ── unrelated key ──► (ignored)
//!                 └───────┘
//!                  │  │  │
//!     deadline ────┘  │  └──── cancel ─────► Err(Cancelled { last_known })
//!         │           │       (also while re-fetching)
//!         │           │
//!         ▼           └─ re-fetch NotFound ─► Removed / Fired
//!   Ok(Fired(current))
//! ```
//!
//! The subscription is owned by the loop and dropped on every exit path.
//! Once subscribed, the event is re-read, so an update published before the
//! subscription was established still moves the deadline. Re-reads race the
//! cancel signal; a stalled store never delays cancellation.

use crate::client::UpcomingClient;
use crate::error::{Result, UpcomingError};
use crate::event::Event;
use futures::StreamExt;
use std::future::Future;
use tokio::time::{Instant, sleep};

/// How a [`wait`](UpcomingClient::wait) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The deadline of the latest known version elapsed.
    Fired(Event),
    /// The key disappeared before the latest known deadline, most likely an
    /// explicit removal. Carries the last known version.
    Removed(Event),
}

impl WaitOutcome {
    /// The last known version of the event.
    #[must_use]
    pub const fn event(&self) -> &Event {
        match self {
            Self::Fired(event) | Self::Removed(event) => event,
        }
    }

    /// Take the last known version of the event.
    #[must_use]
    pub fn into_event(self) -> Event {
        match self {
            Self::Fired(event) | Self::Removed(event) => event,
        }
    }

    /// Whether the event fired.
    #[must_use]
    pub const fn is_fired(&self) -> bool {
        matches!(self, Self::Fired(_))
    }
}

impl UpcomingClient {
    /// Block until `event` fires, following updates published by other
    /// writers, or until `cancel` resolves.
    ///
    /// Any future works as the cancellation signal, e.g. a
    /// `tokio::sync::oneshot::Receiver`, a shutdown broadcast, or
    /// `tokio::signal::ctrl_c()`. Pass `std::future::pending()` to wait
    /// without cancellation.
    ///
    /// The stored version of the event is read once the subscription is in
    /// place and supersedes `event`. If nothing is stored at that point the
    /// wait ends at once, as [`WaitOutcome::Fired`] when `event.when` has
    /// passed and [`WaitOutcome::Removed`] otherwise.
    ///
    /// # Errors
    ///
    /// - [`UpcomingError::Cancelled`] when `cancel` resolves first; it carries
    ///   the last known event.
    /// - [`UpcomingError::SubscriptionLost`] if the notification stream fails
    ///   or ends.
    /// - [`UpcomingError::StoreUnavailable`] if subscribing or re-fetching fails.
    /// - [`UpcomingError::Decode`] if an updated value cannot be decoded.
    pub async fn wait<C>(&self, event: Event, cancel: C) -> Result<WaitOutcome>
    where
        C: Future + Send,
    {
        let key = self.keys.key_for(&event.source, &event.source_id);
        let mut notifications = self.store.subscribe(self.keys.channel()).await?;

        let mut current = event;
        let deadline = sleep(self.remaining(&current));
        tokio::pin!(deadline);
        tokio::pin!(cancel);

        tracing::debug!(key = %key, when = %current.when, "Waiting for upcoming event");

        // Updates published before the subscription existed were not delivered.
        let mut stale = true;

        loop {
            if stale {
                stale = false;

                let fetched = tokio::select! {
                    biased;

                    _ = &mut cancel => return Err(cancelled(&key, current)),
                    fetched = self.fetch(&key) => fetched,
                };

                match fetched {
                    Ok(updated) => {
                        if updated.when != current.when {
                            tracing::debug!(
                                key = %key,
                                previous = %current.when,
                                when = %updated.when,
                                "Upcoming event updated, re-arming"
                            );
                        }
                        current = updated;
                        deadline.as_mut().reset(Instant::now() + self.remaining(&current));
                    }
                    Err(UpcomingError::NotFound { .. }) => {
                        return Ok(if self.remaining(&current).is_zero() {
                            tracing::debug!(key = %key, "Upcoming event fired");
                            WaitOutcome::Fired(current)
                        } else {
                            tracing::debug!(key = %key, "Upcoming event removed while waiting");
                            WaitOutcome::Removed(current)
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            tokio::select! {
                biased;

                _ = &mut cancel => return Err(cancelled(&key, current)),

                () = &mut deadline => {
                    tracing::debug!(key = %key, "Upcoming event fired");
                    return Ok(WaitOutcome::Fired(current));
                }

                message = notifications.next() => {
                    let payload = match message {
                        Some(Ok(payload)) => payload,
                        Some(Err(e)) => {
                            return Err(UpcomingError::SubscriptionLost {
                                key,
                                reason: e.to_string(),
                            });
                        }
                        None => {
                            return Err(UpcomingError::SubscriptionLost {
                                key,
                                reason: "notification stream closed".to_string(),
                            });
                        }
                    };

                    if payload == key {
                        stale = true;
                    } else {
                        tracing::trace!(key = %key, updated = %payload, "Ignoring unrelated update");
                    }
                }
            }
        }
    }
}

fn cancelled(key: &str, last_known: Event) -> UpcomingError {
    tracing::debug!(key = %key, "Wait cancelled");
    UpcomingError::Cancelled {
        key: key.to_string(),
        last_known: Box::new(last_known),
    }
}
