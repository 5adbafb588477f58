//! Tests for subscription cursors and the reload state machine

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use super::*;
use crate::buffer::EventBuffer;
use crate::event::Payload;
use ripple_protocol::{ChangeOp, ServiceInstance};

fn make_event(index: u64, key: &str) -> Event {
    Event {
        topic: Topic::ServiceHealth,
        key: key.to_string(),
        index,
        payload: Payload::ServiceHealth {
            op: ChangeOp::Update,
            instance: ServiceInstance::new("node1", key),
        },
    }
}

fn make_sub(buffer: &EventBuffer, key: &str) -> Subscription {
    let req = SubscribeRequest::new(Topic::ServiceHealth)
        .with_key(key)
        .with_token("secret");
    Subscription::new(req, buffer.head(), &CancellationToken::new())
}

// ============================================================================
// Delivery and filtering tests
// ============================================================================

#[tokio::test]
async fn test_next_delivers_batches_in_order() {
    let buffer = EventBuffer::new();
    let sub = make_sub(&buffer, "web");

    buffer.append(vec![make_event(1, "web")]);
    buffer.append(vec![make_event(2, "web")]);

    let first = sub.next().await.expect("first batch");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].index, 1);

    let second = sub.next().await.expect("second batch");
    assert_eq!(second[0].index, 2);
}

#[tokio::test]
async fn test_key_filter_drops_non_matching_events() {
    let buffer = EventBuffer::new();
    let sub = make_sub(&buffer, "web");

    buffer.append(vec![make_event(1, "db"), make_event(1, "web")]);

    let events = sub.next().await.expect("filtered batch");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "web");
}

#[tokio::test]
async fn test_fully_filtered_batch_is_skipped() {
    let buffer = EventBuffer::new();
    let sub = make_sub(&buffer, "web");

    buffer.append(vec![make_event(1, "db")]);
    buffer.append(vec![make_event(2, "web")]);

    // The db-only batch is consumed silently; the next call lands on the
    // web batch.
    let events = sub.next().await.expect("web batch");
    assert_eq!(events[0].index, 2);
}

#[tokio::test]
async fn test_empty_key_matches_all() {
    let buffer = EventBuffer::new();
    let sub = make_sub(&buffer, "");

    buffer.append(vec![make_event(1, "db"), make_event(1, "web")]);

    let events = sub.next().await.expect("unfiltered batch");
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_control_events_bypass_key_filter() {
    let buffer = EventBuffer::new();
    let sub = make_sub(&buffer, "web");

    buffer.append(vec![Event {
        topic: Topic::ServiceHealth,
        key: String::new(),
        index: 3,
        payload: Payload::EndOfSnapshot,
    }]);

    let events = sub.next().await.expect("control event");
    assert!(events[0].is_end_of_snapshot());
}

// ============================================================================
// Reload state machine tests
// ============================================================================

#[tokio::test]
async fn test_close_reload_wakes_pending_next() {
    let buffer = EventBuffer::new();
    let sub = Arc::new(make_sub(&buffer, "web"));

    let pending = {
        let sub = Arc::clone(&sub);
        tokio::spawn(async move { sub.next().await })
    };
    tokio::task::yield_now().await;

    sub.close_reload();

    let result = timeout(Duration::from_secs(1), pending)
        .await
        .expect("woken by reload")
        .expect("task completed");
    assert_eq!(result.unwrap_err(), StreamError::SubscriptionReload);
}

#[tokio::test]
async fn test_reload_is_terminal_and_repeats() {
    let buffer = EventBuffer::new();
    let sub = make_sub(&buffer, "web");

    sub.close_reload();

    assert_eq!(sub.next().await.unwrap_err(), StreamError::SubscriptionReload);
    assert_eq!(sub.next().await.unwrap_err(), StreamError::SubscriptionReload);
}

#[tokio::test]
async fn test_close_reload_idempotent() {
    let buffer = EventBuffer::new();
    let sub = make_sub(&buffer, "web");

    sub.close_reload();
    sub.close_reload();

    assert_eq!(sub.next().await.unwrap_err(), StreamError::SubscriptionReload);
}

#[tokio::test]
async fn test_reload_after_consuming_events() {
    let buffer = EventBuffer::new();
    let sub = make_sub(&buffer, "web");

    buffer.append(vec![make_event(1, "web")]);
    assert!(sub.next().await.is_ok());

    sub.close_reload();
    assert_eq!(sub.next().await.unwrap_err(), StreamError::SubscriptionReload);
}

// ============================================================================
// Cancellation tests
// ============================================================================

#[tokio::test]
async fn test_caller_cancellation_terminates() {
    let buffer = EventBuffer::new();
    let cancel = CancellationToken::new();
    let req = SubscribeRequest::new(Topic::ServiceHealth).with_token("secret");
    let sub = Arc::new(Subscription::new(req, buffer.head(), &cancel));

    let pending = {
        let sub = Arc::clone(&sub);
        tokio::spawn(async move { sub.next().await })
    };
    tokio::task::yield_now().await;

    cancel.cancel();

    let result = timeout(Duration::from_secs(1), pending)
        .await
        .expect("woken by cancellation")
        .expect("task completed");
    assert_eq!(result.unwrap_err(), StreamError::Cancelled);

    // Cancellation is terminal with the same error.
    assert_eq!(sub.next().await.unwrap_err(), StreamError::Cancelled);
}

#[tokio::test]
async fn test_snapshot_error_terminates() {
    let buffer = EventBuffer::new();
    let sub = make_sub(&buffer, "web");

    buffer.append_err(StreamError::snapshot("store unavailable"));

    assert_eq!(
        sub.next().await.unwrap_err(),
        StreamError::snapshot("store unavailable")
    );
    assert_eq!(
        sub.next().await.unwrap_err(),
        StreamError::snapshot("store unavailable")
    );
}
