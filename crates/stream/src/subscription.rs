//! Subscriptions - per-client cursors over an event buffer
//!
//! A `Subscription` owns a cursor into a buffer chain and hands batches to
//! one client through `next()`. The publisher keeps a shared handle to every
//! live subscription so it can force a reload when the subscriber's effective
//! permissions may have changed.
//!
//! State machine: `open --close_reload--> reloading --next--> closed`, or
//! `open --cancellation--> closed`. Terminal states keep returning the error
//! that closed the subscription.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::buffer::BufferItem;
use crate::error::{Result, StreamError};
use crate::event::{Event, Topic};

/// Counter for generating unique subscription IDs
static SUBSCRIPTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

const STATE_OPEN: u8 = 0;
const STATE_RELOADING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// What a client wants to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    /// Topic to stream.
    pub topic: Topic,
    /// Filter key; empty matches every event on the topic.
    pub key: String,
    /// The ACL token secret the client authenticated with. Subscriptions are
    /// indexed by it for authorization invalidation.
    pub token: String,
    /// Last commit index the client has seen. Zero forces a fresh snapshot;
    /// non-zero attempts the resume fast path.
    pub index: u64,
}

impl SubscribeRequest {
    /// Request a full snapshot-then-follow stream of `topic`.
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            key: String::new(),
            token: String::new(),
            index: 0,
        }
    }

    /// Filter to events matching `key`.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Authenticate with `token`.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Attempt to resume after `index` instead of snapshotting.
    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }
}

/// A live subscription: cursor, filter, and reload state.
#[derive(Debug)]
pub struct Subscription {
    /// Unique identifier, used by the publisher's per-token index.
    id: u64,
    req: SubscribeRequest,
    /// Cursor over the buffer chain. The lock also serializes concurrent
    /// `next` calls, which would otherwise race on the cursor.
    current: Mutex<Arc<BufferItem>>,
    state: AtomicU8,
    /// First terminal error; later `next` calls return it unchanged.
    closed: OnceLock<StreamError>,
    /// Child of the subscriber's token so `close_reload` can wake a pending
    /// `next` without touching the caller's token.
    cancel: CancellationToken,
}

impl Subscription {
    /// Create a subscription starting at `start`.
    ///
    /// Only the publisher constructs subscriptions; clients receive them from
    /// `EventPublisher::subscribe`.
    pub fn new(req: SubscribeRequest, start: Arc<BufferItem>, cancel: &CancellationToken) -> Self {
        Self {
            id: SUBSCRIPTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            req,
            current: Mutex::new(start),
            state: AtomicU8::new(STATE_OPEN),
            closed: OnceLock::new(),
            cancel: cancel.child_token(),
        }
    }

    /// Unique subscription ID.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The request this subscription was created with.
    #[inline]
    pub fn request(&self) -> &SubscribeRequest {
        &self.req
    }

    /// The token the subscription authenticated with.
    #[inline]
    pub fn token(&self) -> &str {
        &self.req.token
    }

    /// Wait for the next batch of events matching the request.
    ///
    /// Batches whose events are all filtered out are skipped. Control events
    /// (`EndOfSnapshot`, `ResumeStream`) always pass the filter.
    ///
    /// # Errors
    ///
    /// - `SubscriptionReload` once the publisher has invalidated this
    ///   subscription; the client must resubscribe.
    /// - `Cancelled` once the caller's token fires.
    /// - `Snapshot` if snapshot materialization failed.
    ///
    /// All three are terminal: the same error is returned on every later
    /// call.
    pub async fn next(&self) -> Result<Vec<Event>> {
        let mut current = self.current.lock().await;
        loop {
            match self.state.load(Ordering::Acquire) {
                STATE_CLOSED => return Err(self.terminal_err()),
                STATE_RELOADING => return Err(self.close(StreamError::SubscriptionReload)),
                _ => {}
            }

            let next = match current.next(&self.cancel).await {
                Ok(item) => item,
                Err(StreamError::Cancelled) => {
                    // close_reload cancels the child token; reload outranks
                    // plain cancellation.
                    if self.state.load(Ordering::Acquire) == STATE_RELOADING {
                        return Err(self.close(StreamError::SubscriptionReload));
                    }
                    return Err(self.close(StreamError::Cancelled));
                }
                Err(err) => return Err(self.close(err)),
            };
            *current = Arc::clone(&next);

            let events = self.filter(next.events());
            if events.is_empty() {
                continue;
            }
            return Ok(events);
        }
    }

    /// Force the subscriber to re-establish the subscription.
    ///
    /// Transitions open → reloading and wakes a pending `next`. Idempotent;
    /// only the publisher calls this.
    pub fn close_reload(&self) {
        if self
            .state
            .compare_exchange(
                STATE_OPEN,
                STATE_RELOADING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.cancel.cancel();
        }
    }

    fn close(&self, err: StreamError) -> StreamError {
        let _ = self.closed.set(err);
        self.state.store(STATE_CLOSED, Ordering::Release);
        self.terminal_err()
    }

    fn terminal_err(&self) -> StreamError {
        self.closed
            .get()
            .cloned()
            .unwrap_or(StreamError::SubscriptionReload)
    }

    fn filter(&self, events: &[Event]) -> Vec<Event> {
        events.iter().filter(|e| self.matches(e)).cloned().collect()
    }

    #[inline]
    fn matches(&self, event: &Event) -> bool {
        if event.payload.is_control() {
            return true;
        }
        if event.topic != self.req.topic {
            return false;
        }
        if !self.req.key.is_empty() && event.key != self.req.key {
            return false;
        }
        true
    }
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
