//! Tests for the wait protocol.
//!
//! All tests run on a paused tokio clock: the in-memory store's TTLs, the
//! client's clock, and the wait deadline advance together, so elapsed times
//! are exact rather than approximate.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::Duration;
use std::future::pending;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep};
use upcoming_core::store::KeyValueStore;
use upcoming_core::{Event, UpcomingClient, UpcomingError, WaitOutcome};
use upcoming_testing::{client, test_time};

const MS: std::time::Duration = std::time::Duration::from_millis(1);

fn event_in(source_id: &str, secs: i64) -> Event {
    Event::new("test", source_id, "Ping", test_time() + Duration::seconds(secs))
}

/// Wait on `event` in the background without cancellation.
fn spawn_wait(
    client: &UpcomingClient,
    event: Event,
) -> tokio::task::JoinHandle<upcoming_core::Result<WaitOutcome>> {
    let client = client.clone();
    tokio::spawn(async move { client.wait(event, pending::<()>()).await })
}

fn assert_elapsed(start: Instant, expected: std::time::Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed <= expected + 5 * MS,
        "expected ~{expected:?}, waited {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn wait_returns_at_original_deadline() {
    let (client, store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let start = Instant::now();

    let outcome = client.wait(event.clone(), pending::<()>()).await.unwrap();

    assert_eq!(outcome, WaitOutcome::Fired(event));
    assert_elapsed(start, std::time::Duration::from_secs(5));
    assert_eq!(store.subscriber_count("upcoming/channel"), 0);
}

#[tokio::test(start_paused = true)]
async fn wait_on_fired_event_returns_immediately() {
    let (client, _store) = client();
    let event = event_in("1", -10);
    let start = Instant::now();

    let outcome = client.wait(event, pending::<()>()).await.unwrap();

    assert!(outcome.is_fired());
    assert_elapsed(start, std::time::Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn earlier_update_supersedes_deadline() {
    let (client, _store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let start = Instant::now();
    let waiter = spawn_wait(&client, event.clone());

    sleep(100 * MS).await;
    let moved = Event::new("test", "1", "Moved", client.now() + Duration::seconds(1));
    client.put(&moved).await.unwrap();

    let outcome = waiter.await.unwrap().unwrap();

    assert_eq!(outcome, WaitOutcome::Fired(moved));
    assert_elapsed(start, std::time::Duration::from_millis(1100));
}

#[tokio::test(start_paused = true)]
async fn later_update_extends_deadline() {
    let (client, _store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let start = Instant::now();
    let waiter = spawn_wait(&client, event.clone());

    sleep(std::time::Duration::from_secs(2)).await;
    let postponed = event.clone().with_when(client.now() + Duration::seconds(6));
    client.put(&postponed).await.unwrap();

    let outcome = waiter.await.unwrap().unwrap();

    assert_eq!(outcome.into_event(), postponed);
    assert_elapsed(start, std::time::Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn unrelated_updates_are_ignored() {
    let (client, _store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let start = Instant::now();
    let waiter = spawn_wait(&client, event.clone());

    sleep(100 * MS).await;
    client.put(&event_in("2", 1)).await.unwrap();
    client.put(&Event::new("other", "1", "Other", client.now() + Duration::seconds(1))).await.unwrap();

    let outcome = waiter.await.unwrap().unwrap();

    assert_eq!(outcome, WaitOutcome::Fired(event));
    assert_elapsed(start, std::time::Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn concurrent_waiters_all_follow_an_update() {
    let (client, _store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let start = Instant::now();
    let first = spawn_wait(&client, event.clone());
    let second = spawn_wait(&client, event.clone());

    sleep(100 * MS).await;
    let moved = event.clone().with_when(client.now() + Duration::seconds(1));
    client.put(&moved).await.unwrap();

    assert_eq!(first.await.unwrap().unwrap(), WaitOutcome::Fired(moved.clone()));
    assert_eq!(second.await.unwrap().unwrap(), WaitOutcome::Fired(moved));
    assert_elapsed(start, std::time::Duration::from_millis(1100));
}

#[tokio::test(start_paused = true)]
async fn cancellation_returns_last_known_event() {
    let (client, store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let start = Instant::now();
    let (cancel, cancelled) = oneshot::channel::<()>();
    let waiter = {
        let client = client.clone();
        let event = event.clone();
        tokio::spawn(async move { client.wait(event, cancelled).await })
    };

    sleep(100 * MS).await;
    let moved = event.clone().with_when(client.now() + Duration::seconds(3));
    client.put(&moved).await.unwrap();
    sleep(100 * MS).await;
    cancel.send(()).unwrap();

    let err = waiter.await.unwrap().unwrap_err();

    assert!(matches!(err, UpcomingError::Cancelled { ref key, .. } if key == "upcoming/test/1"));
    assert_eq!(err.last_known(), Some(&moved));
    assert_elapsed(start, 200 * MS);
    assert_eq!(store.subscriber_count("upcoming/channel"), 0);
}

#[tokio::test(start_paused = true)]
async fn vanished_key_before_deadline_is_removed() {
    let (client, store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let waiter = spawn_wait(&client, event.clone());

    sleep(100 * MS).await;
    assert!(client.remove("test", "1").await.unwrap());
    store.publish("upcoming/channel", "upcoming/test/1").await.unwrap();

    let outcome = waiter.await.unwrap().unwrap();

    assert_eq!(outcome, WaitOutcome::Removed(event));
}

#[tokio::test(start_paused = true)]
async fn undecodable_update_fails_the_wait() {
    let (client, store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let waiter = spawn_wait(&client, event);

    sleep(100 * MS).await;
    store
        .set("upcoming/test/1", b"garbage".to_vec(), std::time::Duration::from_secs(5))
        .await
        .unwrap();
    store.publish("upcoming/channel", "upcoming/test/1").await.unwrap();

    let err = waiter.await.unwrap().unwrap_err();

    assert!(matches!(err, UpcomingError::Decode { .. }));
}

#[tokio::test(start_paused = true)]
async fn lost_subscription_fails_the_wait() {
    let (client, store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let waiter = spawn_wait(&client, event);

    sleep(100 * MS).await;
    store.close_subscriptions();

    let err = waiter.await.unwrap().unwrap_err();

    assert!(matches!(err, UpcomingError::SubscriptionLost { .. }));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_stalled_refetch() {
    let (client, store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let start = Instant::now();
    let (cancel, cancelled) = oneshot::channel::<()>();
    let waiter = {
        let client = client.clone();
        let event = event.clone();
        tokio::spawn(async move { client.wait(event, cancelled).await })
    };

    sleep(100 * MS).await;
    store.stall_gets(true);
    store.publish("upcoming/channel", "upcoming/test/1").await.unwrap();
    sleep(100 * MS).await;
    cancel.send(()).unwrap();

    let err = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
        .await
        .expect("cancellation must not wait for the store")
        .unwrap()
        .unwrap_err();

    assert_eq!(err.last_known(), Some(&event));
    assert_elapsed(start, 200 * MS);
    assert_eq!(store.subscriber_count("upcoming/channel"), 0);
}

#[tokio::test(start_paused = true)]
async fn key_expiring_during_slow_refetch_is_fired() {
    let (client, store) = client();
    let event = event_in("1", 5);
    client.put(&event).await.unwrap();
    let waiter = spawn_wait(&client, event.clone());

    sleep(100 * MS).await;
    // The re-read lands after the TTL has evicted the key.
    store.delay_gets(std::time::Duration::from_secs(6));
    store.publish("upcoming/channel", "upcoming/test/1").await.unwrap();

    let outcome = waiter.await.unwrap().unwrap();

    assert_eq!(outcome, WaitOutcome::Fired(event));
}

#[tokio::test(start_paused = true)]
async fn update_published_before_wait_is_followed() {
    let (client, _store) = client();
    let stale = event_in("1", 5);
    client.put(&stale).await.unwrap();
    // Nobody is subscribed yet, so this notification is dropped.
    let moved = stale.clone().with_when(client.now() + Duration::seconds(1));
    client.put(&moved).await.unwrap();
    let start = Instant::now();

    let outcome = client.wait(stale, pending::<()>()).await.unwrap();

    assert_eq!(outcome, WaitOutcome::Fired(moved));
    assert_elapsed(start, std::time::Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn wait_on_unstored_future_event_is_removed() {
    let (client, _store) = client();
    let event = event_in("never-stored", 5);

    let outcome = client.wait(event.clone(), pending::<()>()).await.unwrap();

    assert_eq!(outcome, WaitOutcome::Removed(event));
}
