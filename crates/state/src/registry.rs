//! Topic registry
//!
//! Maps each topic to the two callbacks the publisher needs: a snapshot
//! builder for new subscribers and a change processor for commits. The
//! registry is assembled at startup and handed to the publisher by value, so
//! there is no runtime mutation path.
//!
//! Either slot may be absent: a topic without a snapshot function cannot be
//! subscribed to externally, and a topic without a change processor emits no
//! events on commit.

use std::collections::HashMap;
use std::sync::Arc;

use ripple_protocol::Change;
use ripple_stream::{Event, SnapshotFn, Topic};

use crate::acl_events::acl_events_from_changes;
use crate::error::BoxError;
use crate::view::StateView;

/// Turns a commit's change set into events.
///
/// Receives the commit's read-only view, its index, and the changed rows.
/// Errors abort the commit.
pub type ProcessChangesFn =
    Arc<dyn Fn(&dyn StateView, u64, &[Change]) -> Result<Vec<Event>, BoxError> + Send + Sync>;

/// The callbacks registered for one topic.
#[derive(Default, Clone)]
pub struct TopicHandlers {
    /// Builds the snapshot new subscribers start from.
    pub snapshot: Option<SnapshotFn>,
    /// Produces events from a commit's change set.
    pub process_changes: Option<ProcessChangesFn>,
}

/// Static topic → handlers table.
#[derive(Default, Clone)]
pub struct TopicRegistry {
    handlers: HashMap<Topic, TopicHandlers>,
}

impl TopicRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in ACL change processor installed.
    ///
    /// ACL topics are internal-only, so none of them get a snapshot function.
    /// All three publish through a single processor registered on the token
    /// topic, which saves iterating the change set three times.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_change_processor(
            Topic::AclTokens,
            Arc::new(|_view: &dyn StateView, index: u64, changes: &[Change]| {
                Ok(acl_events_from_changes(index, changes))
            }),
        );
        registry
    }

    /// Install the full handler set for `topic`, replacing any existing one.
    pub fn register(&mut self, topic: Topic, handlers: TopicHandlers) {
        self.handlers.insert(topic, handlers);
    }

    /// Install (or replace) the snapshot function for `topic`.
    pub fn register_snapshot(&mut self, topic: Topic, snapshot: SnapshotFn) {
        self.handlers.entry(topic).or_default().snapshot = Some(snapshot);
    }

    /// Install (or replace) the change processor for `topic`.
    pub fn register_change_processor(&mut self, topic: Topic, process: ProcessChangesFn) {
        self.handlers.entry(topic).or_default().process_changes = Some(process);
    }

    /// True if `topic` can be subscribed to.
    pub fn has_snapshot(&self, topic: Topic) -> bool {
        self.handlers
            .get(&topic)
            .is_some_and(|h| h.snapshot.is_some())
    }

    /// The snapshot function for `topic`, if registered.
    pub(crate) fn snapshot_fn(&self, topic: Topic) -> Option<SnapshotFn> {
        self.handlers.get(&topic)?.snapshot.clone()
    }

    /// Iterate all registered topics and their handlers.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Topic, &TopicHandlers)> {
        self.handlers.iter()
    }
}
