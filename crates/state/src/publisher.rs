//! Event publisher - fans store commits out to subscribers
//!
//! The publisher sits between the state store's commit path and the streaming
//! core. Commits call `publish_changes`, which maps the change set to events
//! synchronously (so a mapping failure aborts the commit) and hands the
//! result to a single background worker over a bounded channel. The worker
//! appends normal events to per-topic buffers and runs the
//! authorization-invalidation protocol for ACL events; one worker means one
//! writer per topic, which is what gives every subscriber the same order.
//!
//! Subscribers enter through `subscribe`, which serves a cached or fresh
//! snapshot - or, for a reconnecting client whose last-seen index still sits
//! at the topic head, a `ResumeStream` marker - and registers the
//! subscription under its ACL token so invalidation can find it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use ripple_protocol::Change;
use ripple_stream::{
    BufferItem, Event, EventBuffer, EventSnapshot, Payload, StreamError, SubscribeRequest,
    Subscription, Topic,
};

use crate::error::{Result, StateError};
use crate::registry::TopicRegistry;
use crate::view::StateView;

/// Default capacity of the commit-to-worker handoff channel
const DEFAULT_PUBLISH_CAPACITY: usize = 64;

/// Default snapshot cache TTL
const DEFAULT_SNAP_CACHE_TTL: Duration = Duration::from_secs(10);

/// Publisher configuration
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// How long a snapshot stays cached for reuse by other subscribers of
    /// the same topic and key. Short TTLs keep the memory overhead of
    /// duplicated event data low while still absorbing a thundering herd of
    /// watchers subscribing within a few seconds. Zero disables caching.
    pub snap_cache_ttl: Duration,

    /// Capacity of the bounded commit-to-worker channel. A full channel
    /// blocks the commit path, which bounds memory under publish pressure.
    pub publish_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            snap_cache_ttl: DEFAULT_SNAP_CACHE_TTL,
            publish_capacity: DEFAULT_PUBLISH_CAPACITY,
        }
    }
}

impl PublisherConfig {
    /// Create config with a custom snapshot cache TTL
    pub fn with_snap_cache_ttl(mut self, ttl: Duration) -> Self {
        self.snap_cache_ttl = ttl;
        self
    }

    /// Create config with a custom handoff channel capacity
    pub fn with_publish_capacity(mut self, capacity: usize) -> Self {
        self.publish_capacity = capacity.max(1);
        self
    }
}

/// One commit handed from the commit path to the worker.
struct CommitUpdate {
    /// Read view that stays valid after the commit. The worker owns it
    /// exclusively and drops it once the commit's events are processed.
    view: Box<dyn StateView>,
    events: Vec<Event>,
}

/// The event publisher.
pub struct EventPublisher {
    registry: TopicRegistry,
    snap_cache_ttl: Duration,
    /// Guards the three index maps below. The fan-out hot path (cursor
    /// walking in `Subscription::next`) never takes this lock.
    inner: RwLock<PublisherInner>,
    publish_tx: mpsc::Sender<CommitUpdate>,
    /// Cancelled by `shutdown`; stops the worker.
    cancel: CancellationToken,
}

#[derive(Default)]
struct PublisherInner {
    /// Head of the live buffer per topic.
    topic_buffers: HashMap<Topic, Arc<EventBuffer>>,
    /// Cached snapshots by topic and key.
    snap_cache: HashMap<(Topic, String), Arc<EventSnapshot>>,
    /// Live subscriptions indexed by the ACL token secret they subscribed
    /// with, so an ACL change can find the subscriptions it invalidates.
    /// Removal from this map is the sole authorization-driven closure signal.
    subs_by_token: HashMap<String, HashMap<u64, Arc<Subscription>>>,
}

impl EventPublisher {
    /// Create a publisher and spawn its worker task.
    pub fn new(registry: TopicRegistry, config: PublisherConfig) -> Arc<Self> {
        let (publish_tx, publish_rx) = mpsc::channel(config.publish_capacity);

        let publisher = Arc::new(Self {
            registry,
            snap_cache_ttl: config.snap_cache_ttl,
            inner: RwLock::new(PublisherInner::default()),
            publish_tx,
            cancel: CancellationToken::new(),
        });

        tokio::spawn(Self::handle_updates(
            Arc::downgrade(&publisher),
            publish_rx,
            publisher.cancel.clone(),
        ));

        publisher
    }

    /// Publish a commit's change set. Called on the store's commit path.
    ///
    /// Runs every registered change processor synchronously - a processor
    /// error aborts the commit - then enqueues the events for the worker.
    /// Blocks when the handoff channel is full; that backpressure is what
    /// keeps publish memory bounded.
    ///
    /// `view` must be a read handle that remains valid after the commit; the
    /// worker uses it for ACL relation queries and releases it afterwards.
    pub async fn publish_changes(
        &self,
        view: Box<dyn StateView>,
        index: u64,
        changes: &[Change],
    ) -> Result<()> {
        let mut events = Vec::new();
        for (topic, handlers) in self.registry.iter() {
            if let Some(process) = &handlers.process_changes {
                let produced = process(view.as_ref(), index, changes)
                    .map_err(|err| StateError::change_processing(*topic, err))?;
                events.extend(produced);
            }
        }

        self.publish_tx
            .send(CommitUpdate { view, events })
            .await
            .map_err(|_| StateError::PublisherStopped)
    }

    /// Stop the worker. Pending `next` calls are unaffected; no further
    /// commits can publish.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Number of live subscriptions across all tokens.
    pub fn subscription_count(&self) -> usize {
        self.inner
            .read()
            .subs_by_token
            .values()
            .map(|subs| subs.len())
            .sum()
    }

    /// Single worker applying commit updates in order.
    ///
    /// Holds only a weak reference so pending updates do not keep a dropped
    /// publisher alive; a closed channel or the shutdown token ends the loop.
    async fn handle_updates(
        publisher: Weak<Self>,
        mut publish_rx: mpsc::Receiver<CommitUpdate>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                update = publish_rx.recv() => {
                    let Some(update) = update else { break };
                    let Some(publisher) = publisher.upgrade() else { break };
                    publisher.send_events(update);
                }
            }
        }
        debug!("event publisher worker stopped");
    }

    /// Apply one commit's events: invalidation for ACL events, per-topic
    /// appends for the rest.
    fn send_events(&self, update: CommitUpdate) {
        let CommitUpdate { view, events } = update;
        let mut inner = self.inner.write();

        let mut events_by_topic: HashMap<Topic, Vec<Event>> = HashMap::new();
        for event in events {
            // ACL updates are never delivered; they exist to reset the
            // subscriptions whose effective permissions may have changed.
            if event.topic.is_acl() {
                if let Err(err) = Self::handle_acl_update(&mut inner, view.as_ref(), &event) {
                    // Without the query results there is no way to know which
                    // subscriptions the change affects. Reload everything
                    // rather than keep streaming to a client whose
                    // permissions may have changed.
                    error!(error = %err, "acl invalidation query failed, reloading all subscriptions");
                    Self::reload_all(&mut inner);
                }
                continue;
            }

            events_by_topic.entry(event.topic).or_default().push(event);
        }

        for (topic, events) in events_by_topic {
            trace!(topic = %topic, count = events.len(), "publishing events");
            Self::get_topic_buffer(&mut inner, topic).append(events);
        }

        drop(inner);
        // Release the read handle only after all processing is done.
        drop(view);
    }

    /// Buffer for `topic`, created on first use. Caller must hold the lock.
    fn get_topic_buffer(inner: &mut PublisherInner, topic: Topic) -> Arc<EventBuffer> {
        Arc::clone(inner.topic_buffers.entry(topic).or_default())
    }

    /// Close every subscription whose effective permissions the given ACL
    /// event may have changed.
    fn handle_acl_update(
        inner: &mut PublisherInner,
        view: &dyn StateView,
        event: &Event,
    ) -> Result<()> {
        match &event.payload {
            Payload::AclToken(token) => {
                Self::close_subscriptions_for_secret(inner, &token.secret_id);
            }
            Payload::AclPolicy(policy) => {
                let tokens = view.tokens_linked_to_policy(&policy.id)?;
                Self::close_subscriptions_for_tokens(inner, &tokens);

                // Tokens can also reach the policy through a role. Roles do
                // not nest, so one level of expansion is complete.
                for role in view.roles_linked_to_policy(&policy.id)? {
                    let tokens = view.tokens_linked_to_role(&role.id)?;
                    Self::close_subscriptions_for_tokens(inner, &tokens);
                }
            }
            Payload::AclRole(role) => {
                let tokens = view.tokens_linked_to_role(&role.id)?;
                Self::close_subscriptions_for_tokens(inner, &tokens);
            }
            _ => {}
        }
        Ok(())
    }

    fn close_subscriptions_for_tokens(
        inner: &mut PublisherInner,
        tokens: &[ripple_protocol::AclToken],
    ) {
        for token in tokens {
            Self::close_subscriptions_for_secret(inner, &token.secret_id);
        }
    }

    fn close_subscriptions_for_secret(inner: &mut PublisherInner, secret_id: &str) {
        if let Some(subs) = inner.subs_by_token.get(secret_id) {
            debug!(count = subs.len(), "reloading subscriptions for acl change");
            for sub in subs.values() {
                sub.close_reload();
            }
        }
    }

    fn reload_all(inner: &mut PublisherInner) {
        let count: usize = inner.subs_by_token.values().map(|subs| subs.len()).sum();
        warn!(count, "force-reloading all subscriptions");
        for subs in inner.subs_by_token.values() {
            for sub in subs.values() {
                sub.close_reload();
            }
        }
    }

    /// Create a subscription for `req`.
    ///
    /// The subscription streams a snapshot of matching state first (unless
    /// the resume fast path applies) and then blocks on new events until
    /// `cancel` fires or the publisher resets it. Callers must pass the
    /// subscription to `unsubscribe` when done with it, whatever the reason,
    /// to free the ACL tracking entry.
    ///
    /// # Errors
    ///
    /// `UnknownTopic` if the topic has no registered snapshot function.
    pub fn subscribe(
        self: &Arc<Self>,
        req: SubscribeRequest,
        cancel: &CancellationToken,
    ) -> ripple_stream::Result<Arc<Subscription>> {
        if !self.registry.has_snapshot(req.topic) {
            return Err(StreamError::UnknownTopic(req.topic));
        }

        let mut inner = self.inner.write();

        // Make sure the topic buffer exists so future events are captured
        // from this point on.
        let buf = Self::get_topic_buffer(&mut inner, req.topic);
        let topic_head = buf.head();

        let sub = if req.index > 0 && topic_head.first_index() == Some(req.index) {
            // The client's last-seen index is still at the head of the topic
            // buffer, so its cached state is good: skip the snapshot and send
            // the resume marker instead. (A legitimate empty snapshot is
            // distinguishable because the marker is its own payload kind.)
            let resume = Event {
                topic: req.topic,
                key: req.key.clone(),
                index: req.index,
                payload: Payload::ResumeStream,
            };

            let buf = EventBuffer::new();
            // The head before the append is the subscription's starting
            // point, so the marker is the first thing delivered.
            let sub_head = buf.head();
            buf.append(vec![resume]);

            // Splice the live chain on so the subscription follows the topic
            // past its last-seen index.
            buf.append_buffer(topic_head.follow_after());

            Arc::new(Subscription::new(req, sub_head, cancel))
        } else {
            let snap = self.get_snapshot_locked(&mut inner, &req, topic_head)?;
            Arc::new(Subscription::new(req, snap.head(), cancel))
        };

        inner
            .subs_by_token
            .entry(sub.token().to_string())
            .or_default()
            .insert(sub.id(), Arc::clone(&sub));

        let req = sub.request();
        debug!(id = sub.id(), topic = %req.topic, key = %req.key, "new subscription");

        Ok(sub)
    }

    /// Drop the ACL tracking entry for `sub`.
    ///
    /// Idempotent. Does not cancel an in-flight `next`; that is the caller's
    /// cancellation token's job.
    pub fn unsubscribe(&self, sub: &Subscription) {
        let mut inner = self.inner.write();

        let Some(subs) = inner.subs_by_token.get_mut(sub.token()) else {
            return;
        };
        if subs.remove(&sub.id()).is_some() {
            debug!(id = sub.id(), "subscription removed");
        }
        if subs.is_empty() {
            inner.subs_by_token.remove(sub.token());
        }
    }

    /// Cached or fresh snapshot for `req`. Caller must hold the lock.
    fn get_snapshot_locked(
        self: &Arc<Self>,
        inner: &mut PublisherInner,
        req: &SubscribeRequest,
        topic_head: Arc<BufferItem>,
    ) -> ripple_stream::Result<Arc<EventSnapshot>> {
        let cache_key = (req.topic, req.key.clone());

        // An errored snapshot is never served again; the next subscriber
        // rebuilds it.
        if let Some(snap) = inner.snap_cache.get(&cache_key)
            && snap.err().is_none()
        {
            trace!(topic = %req.topic, key = %req.key, "snapshot cache hit");
            return Ok(Arc::clone(snap));
        }

        let snap_fn = self
            .registry
            .snapshot_fn(req.topic)
            .ok_or(StreamError::UnknownTopic(req.topic))?;

        let snap = EventSnapshot::new(req.clone(), topic_head, snap_fn);

        if !self.snap_cache_ttl.is_zero() {
            inner.snap_cache.insert(cache_key.clone(), Arc::clone(&snap));

            // Evict unconditionally after the TTL. In-flight subscriptions
            // keep their own reference; only a weak publisher handle is held
            // so a pending eviction cannot outlive the publisher.
            let publisher = Arc::downgrade(self);
            let ttl = self.snap_cache_ttl;
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Some(publisher) = publisher.upgrade() {
                    publisher.inner.write().snap_cache.remove(&cache_key);
                }
            });
        }

        Ok(snap)
    }
}

#[cfg(test)]
#[path = "publisher_test.rs"]
mod tests;
