//! In-memory key-value store for fast, deterministic testing.
//!
//! [`InMemoryStore`] honours TTLs using [`tokio::time::Instant`], so tests
//! running with a paused clock (`#[tokio::test(start_paused = true)]`) can
//! advance time and watch events fire without sleeping for real.
//!
//! Pub/sub is backed by one [`tokio::sync::broadcast`] channel per name.
//! Like the real store, messages published with no subscriber are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use upcoming_core::store::{KeyValueStore, MessageStream, StoreError, StoreFuture};

/// Capacity of each channel's broadcast buffer.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_publish: AtomicBool,
    /// Deletes left before every further delete fails. `usize::MAX` disables.
    deletes_before_failure: AtomicUsize,
    /// Milliseconds each `get` sleeps before reading.
    get_delay_ms: AtomicU64,
    /// Whether `get` never completes.
    stall_gets: AtomicBool,
}

/// In-memory [`KeyValueStore`] with TTL expiry and broadcast pub/sub.
///
/// Clones share the same data.
///
/// # Example
///
/// ```
/// use upcoming_testing::InMemoryStore;
/// use upcoming_core::store::KeyValueStore;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// store.set("upcoming/test/1", b"{}".to_vec(), Duration::from_secs(10)).await?;
/// assert!(store.get("upcoming/test/1").await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        let faults = Faults::default();
        faults.deletes_before_failure.store(usize::MAX, Ordering::SeqCst);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            channels: Arc::new(Mutex::new(HashMap::new())),
            faults: Arc::new(faults),
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::ConnectionFailed("Mutex lock failed".to_string()))
    }

    fn channels(&self) -> Result<MutexGuard<'_, HashMap<String, broadcast::Sender<String>>>, StoreError> {
        self.channels
            .lock()
            .map_err(|_| StoreError::ConnectionFailed("Mutex lock failed".to_string()))
    }

    fn live_value(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Remaining TTL of `key`, or `None` if it is absent or expired.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries().ok()?;
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries()
            .map(|entries| entries.values().filter(|entry| entry.is_live(now)).count())
            .unwrap_or(0)
    }

    /// Whether the store holds no live keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of active subscriptions on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels()
            .ok()
            .and_then(|channels| channels.get(channel).map(broadcast::Sender::receiver_count))
            .unwrap_or(0)
    }

    /// Make every subsequent publish fail.
    pub fn fail_publish(&self, fail: bool) {
        self.faults.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Allow `count` more deletes, then fail every delete after that.
    pub fn fail_deletes_after(&self, count: usize) {
        self.faults.deletes_before_failure.store(count, Ordering::SeqCst);
    }

    /// Make every subsequent `get` sleep for `delay` before reading, as a
    /// slow store would. The value is read after the delay, so keys can
    /// expire in between.
    pub fn delay_gets(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.faults.get_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Make every subsequent `get` hang forever, as a stalled connection
    /// would.
    pub fn stall_gets(&self, stall: bool) {
        self.faults.stall_gets.store(stall, Ordering::SeqCst);
    }

    /// Close every subscription, as if the store dropped its pub/sub
    /// connections.
    pub fn close_subscriptions(&self) {
        if let Ok(mut channels) = self.channels() {
            channels.clear();
        }
    }

    fn sender(&self, channel: &str) -> Result<broadcast::Sender<String>, StoreError> {
        let mut channels = self.channels()?;
        Ok(channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Match a pattern with at most a single trailing `*`.
fn matches_pattern(pattern: &str, key: &str) -> bool {
    pattern
        .strip_suffix('*')
        .map_or(pattern == key, |prefix| key.starts_with(prefix))
}

impl KeyValueStore for InMemoryStore {
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            let expires_at = Instant::now() + ttl;
            self.entries()?.insert(key, Entry { value, expires_at });
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StoreFuture<'_, Option<Vec<u8>>> {
        let key = key.to_string();
        Box::pin(async move {
            if self.faults.stall_gets.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let delay_ms = self.faults.get_delay_ms.load(Ordering::SeqCst);
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            self.live_value(&key)
        })
    }

    fn multi_get(&self, keys: &[String]) -> StoreFuture<'_, Vec<Option<Vec<u8>>>> {
        let keys = keys.to_vec();
        Box::pin(async move {
            let values: Result<Vec<_>, StoreError> =
                keys.iter().map(|key| self.live_value(key)).collect();
            values
        })
    }

    fn keys(&self, pattern: &str) -> StoreFuture<'_, Vec<String>> {
        let pattern = pattern.to_string();
        Box::pin(async move {
            let now = Instant::now();
            let mut entries = self.entries()?;
            entries.retain(|_, entry| entry.is_live(now));
            let matching: Vec<String> = entries
                .keys()
                .filter(|key| matches_pattern(&pattern, key))
                .cloned()
                .collect();
            Ok(matching)
        })
    }

    fn delete(&self, key: &str) -> StoreFuture<'_, bool> {
        let key = key.to_string();
        Box::pin(async move {
            let allowed = self
                .faults
                .deletes_before_failure
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                    usize::MAX => Some(usize::MAX),
                    0 => None,
                    left => Some(left - 1),
                })
                .is_ok();
            if !allowed {
                return Err(StoreError::CommandFailed {
                    command: "DEL",
                    key,
                    reason: "injected failure".to_string(),
                });
            }

            let now = Instant::now();
            Ok(self
                .entries()?
                .remove(&key)
                .is_some_and(|entry| entry.is_live(now)))
        })
    }

    fn publish(&self, channel: &str, message: &str) -> StoreFuture<'_, ()> {
        let channel = channel.to_string();
        let message = message.to_string();
        Box::pin(async move {
            if self.faults.fail_publish.load(Ordering::SeqCst) {
                return Err(StoreError::PublishFailed {
                    channel,
                    reason: "injected failure".to_string(),
                });
            }

            // No subscribers is not an error: the message is simply dropped.
            let receivers = self.sender(&channel)?.send(message).unwrap_or(0);
            tracing::trace!(channel = %channel, receivers = receivers, "Published message");
            Ok(())
        })
    }

    fn subscribe(&self, channel: &str) -> StoreFuture<'_, MessageStream> {
        let channel = channel.to_string();
        Box::pin(async move {
            let mut rx = self.sender(&channel)?.subscribe();

            let stream = async_stream::stream! {
                loop {
                    match rx.recv().await {
                        Ok(message) => yield Ok(message),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped = skipped, "Subscriber lagged, messages dropped");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn pattern_matching() {
        assert!(matches_pattern("upcoming/*", "upcoming/a/1"));
        assert!(matches_pattern("upcoming/a/*", "upcoming/a/1"));
        assert!(!matches_pattern("upcoming/a/*", "upcoming/ab/1"));
        assert!(matches_pattern("upcoming/a/1", "upcoming/a/1"));
        assert!(!matches_pattern("upcoming/a/1", "upcoming/a/10"));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_after_ttl() {
        let store = InMemoryStore::new();
        store.set("k", b"v".to_vec(), Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(1)));
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.keys("*").await.unwrap().is_empty());
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn multi_get_reports_missing_individually() {
        let store = InMemoryStore::new();
        store.set("a", b"1".to_vec(), Duration::from_secs(60)).await.unwrap();

        let values = store
            .multi_get(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(b"1".to_vec()), None]);
    }

    #[tokio::test]
    async fn publish_reaches_subscribers_only() {
        let store = InMemoryStore::new();
        store.publish("ch", "before").await.unwrap();

        let mut stream = store.subscribe("ch").await.unwrap();
        assert_eq!(store.subscriber_count("ch"), 1);

        store.publish("ch", "after").await.unwrap();
        assert_eq!(stream.next().await, Some(Ok("after".to_string())));

        drop(stream);
        assert_eq!(store.subscriber_count("ch"), 0);
    }

    #[tokio::test]
    async fn closing_subscriptions_ends_streams() {
        let store = InMemoryStore::new();
        let mut stream = store.subscribe("ch").await.unwrap();

        store.close_subscriptions();
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_get_reads_after_the_delay() {
        let store = InMemoryStore::new();
        store.set("k", b"v".to_vec(), Duration::from_secs(5)).await.unwrap();

        store.delay_gets(Duration::from_secs(6));
        let start = Instant::now();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_get_never_completes() {
        let store = InMemoryStore::new();
        store.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();

        store.stall_gets(true);
        let result = tokio::time::timeout(Duration::from_secs(30), store.get("k")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn injected_delete_failures() {
        let store = InMemoryStore::new();
        store.set("a", b"1".to_vec(), Duration::from_secs(60)).await.unwrap();
        store.set("b", b"2".to_vec(), Duration::from_secs(60)).await.unwrap();

        store.fail_deletes_after(1);
        assert!(store.delete("a").await.unwrap());
        assert!(matches!(
            store.delete("b").await,
            Err(StoreError::CommandFailed { command: "DEL", .. })
        ));
    }
}
