//! Backing key-value store abstraction.
//!
//! The [`UpcomingClient`](crate::client::UpcomingClient) needs a small set of
//! primitives from the store underneath it:
//!
//! ```text
//! ┌──────────────────┐   set(key, value, ttl)    ┌──────────────────┐
//! │                  │ ────────────────────────► │                  │
//! │  UpcomingClient  │   get / multi_get / keys  │  KeyValueStore   │
//! │                  │ ────────────────────────► │  (Redis, memory) │
//! │                  │   delete                  │                  │
//! │                  │ ────────────────────────► │                  │
//! │                  │   publish(channel, key)   │                  │
//! │                  │ ────────────────────────► │                  │
//! │   Wait loop      │ ◄──────────────────────── │  subscribe       │
//! └──────────────────┘      MessageStream        └──────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **TTL is the scheduler**: the store must evict a key once its TTL elapses
//! - **Missing is not an error**: `get`, `multi_get`, and `delete` report absence
//!   as `None`/`false`, never as a [`StoreError`]
//! - **At-most-once notifications**: messages published while nobody is
//!   subscribed are lost
//!
//! # Implementations
//!
//! - `RedisStore` in `upcoming-redis` - for production
//! - `InMemoryStore` in `upcoming-testing` - for tests (real TTL expiry, broadcast pub/sub)

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Failed to connect to the store
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A command against a key failed
    #[error("{command} failed for '{key}': {reason}")]
    CommandFailed {
        /// The command that failed (e.g. "SET")
        command: &'static str,
        /// The key or pattern the command targeted
        key: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to publish a message to a channel
    #[error("Publish failed for channel '{channel}': {reason}")]
    PublishFailed {
        /// The channel that failed
        channel: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to a channel
    #[error("Subscription failed for channel '{channel}': {reason}")]
    SubscriptionFailed {
        /// The channel that failed to subscribe
        channel: String,
        /// The reason for failure
        reason: String,
    },

    /// An established subscription broke
    #[error("Subscription lost: {0}")]
    SubscriptionLost(String),
}

/// Boxed future returned by [`KeyValueStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Stream of channel messages from a subscription.
///
/// Each item is the message payload or a transport error. The stream ending
/// means the subscription was closed by the store. Dropping the stream
/// unsubscribes.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<String, StoreError>> + Send>>;

/// Trait for backing store implementations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store is shared by every clone
/// of a client and by concurrent waiters.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the client can hold an
/// `Arc<dyn KeyValueStore>` chosen at runtime.
pub trait KeyValueStore: Send + Sync {
    /// Create or overwrite `key`, evicting it after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CommandFailed`] if the write fails.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreFuture<'_, ()>;

    /// Fetch one value. `None` when the key is absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CommandFailed`] on transport failure.
    fn get(&self, key: &str) -> StoreFuture<'_, Option<Vec<u8>>>;

    /// Fetch many values in one round trip, in the order of `keys`.
    ///
    /// Missing entries are `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CommandFailed`] on transport failure.
    fn multi_get(&self, keys: &[String]) -> StoreFuture<'_, Vec<Option<Vec<u8>>>>;

    /// List keys matching a pattern with a single trailing `*` wildcard.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CommandFailed`] on transport failure.
    fn keys(&self, pattern: &str) -> StoreFuture<'_, Vec<String>>;

    /// Delete one key, reporting whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CommandFailed`] on transport failure.
    fn delete(&self, key: &str) -> StoreFuture<'_, bool>;

    /// Publish `message` on `channel` to current subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PublishFailed`] if the message could not be sent.
    fn publish(&self, channel: &str, message: &str) -> StoreFuture<'_, ()>;

    /// Subscribe to `channel`.
    ///
    /// The subscription is active once the returned future resolves.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SubscriptionFailed`] if the subscription cannot be
    /// established.
    fn subscribe(&self, channel: &str) -> StoreFuture<'_, MessageStream>;
}
