//! Redis backing store for upcoming events.
//!
//! This crate provides [`RedisStore`], the production implementation of the
//! [`KeyValueStore`] trait from `upcoming-core`.
//!
//! # Architecture
//!
//! Events are stored in Redis with:
//! - **Primary key**: `upcoming/{source}/{source_id}` → JSON-encoded event
//! - **TTL**: `PSETEX` with the milliseconds left until the event fires
//! - **Notifications**: `PUBLISH upcoming/channel {key}` after every write
//!
//! Commands share one `ConnectionManager` (multiplexed, reconnecting). Each
//! subscription opens its own pub/sub connection, closed when the returned
//! stream is dropped.
//!
//! # Delivery Semantics
//!
//! Redis pub/sub is **at-most-once**: a message published while a subscriber
//! is reconnecting or not yet subscribed is lost. Waiters treat notifications
//! as a liveness hint, not as the source of truth.
//!
//! # Example
//!
//! ```no_run
//! use upcoming_core::{ListOptions, UpcomingConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = upcoming_redis::connect(&UpcomingConfig::new("localhost:6379")).await?;
//!
//! for event in client.list(&ListOptions::default()).await? {
//!     println!("{} ({})", event.title, event.source);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use std::time::Duration;
use upcoming_core::store::{KeyValueStore, MessageStream, StoreError, StoreFuture};
use upcoming_core::{UpcomingClient, UpcomingConfig};

/// Connect a client to the Redis store named by `config`.
///
/// # Errors
///
/// Returns [`StoreError::ConnectionFailed`] if the URL is invalid or Redis is
/// unreachable.
pub async fn connect(config: &UpcomingConfig) -> Result<UpcomingClient, StoreError> {
    let store = RedisStore::new(&config.redis_url()).await?;
    Ok(UpcomingClient::new(Arc::new(store), config))
}

/// Redis implementation of [`KeyValueStore`].
///
/// # Thread Safety
///
/// This type is `Clone` and can be safely shared across threads.
/// Each clone shares the same `ConnectionManager`.
#[derive(Clone)]
pub struct RedisStore {
    /// Client used to open pub/sub connections.
    client: Client,
    /// Connection manager for commands.
    conn_manager: ConnectionManager,
}

impl RedisStore {
    /// Create a new Redis store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if the URL is invalid or the
    /// connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!(redis_url = %redis_url, "Connected to Redis");

        Ok(Self {
            client,
            conn_manager,
        })
    }
}

/// TTL in whole milliseconds, rounded up so a key never expires before its
/// deadline. PSETEX rejects 0, so the result is at least 1.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_nanos().div_ceil(1_000_000))
        .unwrap_or(u64::MAX)
        .max(1)
}

fn command_failed(command: &'static str, key: &str, error: &redis::RedisError) -> StoreError {
    StoreError::CommandFailed {
        command,
        key: key.to_string(),
        reason: error.to_string(),
    }
}

impl KeyValueStore for RedisStore {
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreFuture<'_, ()> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();

        Box::pin(async move {
            let ttl_ms = ttl_millis(ttl);

            let _: () = conn
                .pset_ex(&key, value, ttl_ms)
                .await
                .map_err(|e| command_failed("PSETEX", &key, &e))?;

            tracing::trace!(key = %key, ttl_ms = ttl_ms, "PSETEX");
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StoreFuture<'_, Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();

        Box::pin(async move {
            let value: Option<Vec<u8>> = conn
                .get(&key)
                .await
                .map_err(|e| command_failed("GET", &key, &e))?;
            Ok(value)
        })
    }

    fn multi_get(&self, keys: &[String]) -> StoreFuture<'_, Vec<Option<Vec<u8>>>> {
        let mut conn = self.conn_manager.clone();
        let keys = keys.to_vec();

        Box::pin(async move {
            if keys.is_empty() {
                return Ok(Vec::new());
            }

            let values: Vec<Option<Vec<u8>>> = conn
                .mget(&keys)
                .await
                .map_err(|e| command_failed("MGET", &keys.join(" "), &e))?;
            Ok(values)
        })
    }

    fn keys(&self, pattern: &str) -> StoreFuture<'_, Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let pattern = pattern.to_string();

        Box::pin(async move {
            let keys: Vec<String> = conn
                .keys(&pattern)
                .await
                .map_err(|e| command_failed("KEYS", &pattern, &e))?;
            Ok(keys)
        })
    }

    fn delete(&self, key: &str) -> StoreFuture<'_, bool> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();

        Box::pin(async move {
            let deleted: u64 = conn
                .del(&key)
                .await
                .map_err(|e| command_failed("DEL", &key, &e))?;
            Ok(deleted > 0)
        })
    }

    fn publish(&self, channel: &str, message: &str) -> StoreFuture<'_, ()> {
        let mut conn = self.conn_manager.clone();
        let channel = channel.to_string();
        let message = message.to_string();

        Box::pin(async move {
            let published: redis::RedisResult<i64> = conn.publish(&channel, &message).await;
            match published {
                Ok(receivers) => {
                    tracing::debug!(
                        channel = %channel,
                        message = %message,
                        receivers = receivers,
                        "Published update"
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(channel = %channel, error = %e, "Failed to publish update");
                    Err(StoreError::PublishFailed {
                        channel,
                        reason: e.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(&self, channel: &str) -> StoreFuture<'_, MessageStream> {
        let client = self.client.clone();
        let channel = channel.to_string();

        Box::pin(async move {
            let mut pubsub = client.get_async_pubsub().await.map_err(|e| {
                StoreError::SubscriptionFailed {
                    channel: channel.clone(),
                    reason: format!("Failed to open pub/sub connection: {e}"),
                }
            })?;

            pubsub.subscribe(&channel).await.map_err(|e| {
                StoreError::SubscriptionFailed {
                    channel: channel.clone(),
                    reason: format!("Failed to subscribe: {e}"),
                }
            })?;

            tracing::debug!(channel = %channel, "Subscribed to channel");

            // The stream owns the pub/sub connection; dropping it unsubscribes.
            let stream = pubsub.into_on_message().map(|msg| {
                msg.get_payload::<String>().map_err(|e| {
                    StoreError::SubscriptionLost(format!("Undecodable message payload: {e}"))
                })
            });

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
