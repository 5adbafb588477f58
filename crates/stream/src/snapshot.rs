//! Snapshot materialization and the snapshot-to-live splice
//!
//! An `EventSnapshot` owns a private buffer that is filled with the events
//! reconstructing current state for one `(topic, key)` filter, terminated by
//! the `EndOfSnapshot` marker, and then spliced onto the live topic chain so
//! a cursor flows from history into the tail without losing or repeating a
//! batch.
//!
//! The live chain head is captured *before* materialization starts. Batches
//! published while the snapshot is being built sit after that head; the
//! splice walks them and skips any whose index is already reflected in the
//! snapshot, attaching at the first newer batch (or at the chain tip when
//! caught up).

use std::sync::Arc;

use crate::buffer::{BufferItem, EventBuffer};
use crate::error::{Result, StreamError};
use crate::event::{Event, Payload};
use crate::subscription::SubscribeRequest;

/// Builds the snapshot for one topic.
///
/// Appends to `buf` every event needed to reconstruct the state visible to
/// the request (respecting its key filter) and returns the commit index the
/// snapshot is consistent at. Must not append the `EndOfSnapshot` marker;
/// the framework does that.
pub type SnapshotFn = Arc<dyn Fn(&SubscribeRequest, &EventBuffer) -> Result<u64> + Send + Sync>;

/// A materialized (or materializing) snapshot joined to the live chain.
///
/// Construction returns immediately; the snapshot function runs on a
/// blocking thread and subscribers stream events as they are appended.
#[derive(Debug)]
pub struct EventSnapshot {
    /// Start of the private chain; new cursors begin here.
    head: Arc<BufferItem>,
    buffer: Arc<EventBuffer>,
}

impl EventSnapshot {
    /// Start materializing a snapshot for `req`.
    ///
    /// `topic_head` must be the live topic buffer's head captured before any
    /// snapshot work, so that concurrently published batches are spliced in
    /// exactly once.
    pub fn new(
        req: SubscribeRequest,
        topic_head: Arc<BufferItem>,
        snap_fn: SnapshotFn,
    ) -> Arc<Self> {
        let buffer = Arc::new(EventBuffer::new());
        let snap = Arc::new(Self {
            head: buffer.head(),
            buffer,
        });

        let worker = Arc::clone(&snap);
        tokio::task::spawn_blocking(move || worker.materialize(&req, &snap_fn, topic_head));

        snap
    }

    /// Starting cursor position for subscriptions using this snapshot.
    pub fn head(&self) -> Arc<BufferItem> {
        Arc::clone(&self.head)
    }

    /// The materialization error, if the snapshot function failed.
    ///
    /// A failed snapshot publishes an error item at its buffer head; the
    /// cache checks this slot so an errored entry is never served again.
    pub fn err(&self) -> Option<StreamError> {
        self.buffer.head().err().cloned()
    }

    fn materialize(&self, req: &SubscribeRequest, snap_fn: &SnapshotFn, topic_head: Arc<BufferItem>) {
        let index = match snap_fn(req, &self.buffer) {
            Ok(index) => index,
            Err(err) => {
                self.buffer.append_err(err);
                return;
            }
        };

        self.buffer.append(vec![Event {
            topic: req.topic,
            key: req.key.clone(),
            index,
            payload: Payload::EndOfSnapshot,
        }]);

        self.splice_from_topic_buffer(topic_head, index);
    }

    /// Join the snapshot chain to the live chain at the right seam.
    ///
    /// Walks forward from the captured head without blocking. Batches with
    /// first index at or below `snap_index` are already reflected in the
    /// snapshot and are skipped; the first newer batch (or the chain tip) is
    /// spliced in.
    fn splice_from_topic_buffer(&self, topic_head: Arc<BufferItem>, snap_index: u64) {
        let mut item = topic_head;
        loop {
            let Some(next) = item.next_no_block() else {
                // Caught up with the live chain: attach after `item` so
                // future appends flow into the snapshot buffer.
                self.buffer.append_buffer(item.follow_after());
                return;
            };

            if next.err().is_some() {
                self.buffer.append_buffer(next);
                return;
            }

            match next.first_index() {
                Some(index) if index > snap_index => {
                    self.buffer.append_buffer(next);
                    return;
                }
                _ => item = next,
            }
        }
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
