//! Error types for upcoming event operations.

use crate::event::Event;
use crate::store::StoreError;
use thiserror::Error;

/// Result type alias for upcoming event operations.
pub type Result<T> = std::result::Result<T, UpcomingError>;

/// Errors returned by [`UpcomingClient`](crate::client::UpcomingClient).
///
/// `NotFound` is an expected outcome and is never logged as an error by the
/// client. Every other variant is surfaced to the caller, who owns retry policy.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UpcomingError {
    /// The store could not serve the request (connection or command failure).
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// No value is stored at the key.
    #[error("No upcoming event at '{key}'")]
    NotFound {
        /// The key that was looked up
        key: String,
    },

    /// A value exists at the key but is not an encoded event.
    #[error("Failed to decode upcoming event at '{key}': {reason}")]
    Decode {
        /// The key holding the undecodable value
        key: String,
        /// Decoder message
        reason: String,
    },

    /// The event could not be encoded. Indicates a defect, not an
    /// environmental condition.
    #[error("Failed to encode upcoming event for '{key}': {reason}")]
    Encode {
        /// The key the event was destined for
        key: String,
        /// Encoder message
        reason: String,
    },

    /// The event was stored but the update notification was not sent.
    ///
    /// The write has taken effect; waiters on the key may not observe it.
    #[error("Stored '{key}' but failed to publish the update: {cause}")]
    PublishFailed {
        /// The key that was written
        key: String,
        /// The store failure
        #[source]
        cause: StoreError,
    },

    /// Bulk removal stopped partway. Keys already deleted stay deleted.
    #[error("Removed {deleted} event(s) of source '{source_name}' before failing on '{key}': {cause}")]
    RemoveAllIncomplete {
        /// The source being cleared
        source_name: String,
        /// Number of keys deleted before the failure
        deleted: u64,
        /// The key whose delete failed
        key: String,
        /// The store failure
        #[source]
        cause: StoreError,
    },

    /// A wait was cancelled by the caller.
    #[error("Wait for '{key}' was cancelled")]
    Cancelled {
        /// The key being waited on
        key: String,
        /// Most recent known version of the event
        last_known: Box<Event>,
    },

    /// The notification subscription broke during a wait.
    #[error("Notification subscription lost while waiting for '{key}': {reason}")]
    SubscriptionLost {
        /// The key being waited on
        key: String,
        /// Why the subscription ended
        reason: String,
    },
}

impl UpcomingError {
    /// Whether this error means the key was absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The last known event carried by a cancelled wait.
    #[must_use]
    pub fn last_known(&self) -> Option<&Event> {
        match self {
            Self::Cancelled { last_known, .. } => Some(&**last_known),
            _ => None,
        }
    }
}
