//! Append-only event buffer
//!
//! An `EventBuffer` is an unbounded single-writer, many-reader chain of
//! immutable event batches. The writer appends batches at the head; each
//! reader independently walks the chain through per-item forward links,
//! waiting on the item's notifier when it has caught up.
//!
//! Memory is bounded by the slowest reader: an item is reclaimed once no
//! subscription or snapshot holds an `Arc` to it or to an earlier item, so
//! the chain never needs eviction decisions. There is no lock on the read
//! path; the forward link is written once with release semantics and read
//! with acquire semantics.
//!
//! Callers must serialize `append` calls on the same buffer. The publisher
//! does this with its own lock; the head slot's lock alone is not enough to
//! order concurrent appends.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StreamError};
use crate::event::Event;

/// Append-only chain of event batches.
#[derive(Debug)]
pub struct EventBuffer {
    /// Most recently appended item; a sentinel empty item when fresh.
    head: RwLock<Arc<BufferItem>>,
}

impl EventBuffer {
    /// Create an empty buffer whose head is a sentinel item.
    pub fn new() -> Self {
        Self {
            head: RwLock::new(Arc::new(BufferItem::sentinel())),
        }
    }

    /// Atomically publish one batch of events.
    ///
    /// The previous head's forward link is set to the new batch and all
    /// readers waiting on it are woken in one operation.
    pub fn append(&self, events: Vec<Event>) {
        self.append_item(Arc::new(BufferItem::new(events)));
    }

    /// Publish an error item, terminating every follower with `err`.
    ///
    /// Used by snapshot materialization to propagate a failure to the
    /// subscribers already following the snapshot buffer.
    pub fn append_err(&self, err: StreamError) {
        self.append_item(Arc::new(BufferItem::error(err)));
    }

    /// Splice another chain onto this one.
    ///
    /// The current head's forward link is pointed at `item`, so readers that
    /// finish this buffer continue into the other chain. Used to join a
    /// private snapshot buffer to the live topic buffer.
    pub fn append_buffer(&self, item: Arc<BufferItem>) {
        self.append_item(item);
    }

    fn append_item(&self, item: Arc<BufferItem>) {
        let old_head = {
            let mut head = self.head.write();
            std::mem::replace(&mut *head, Arc::clone(&item))
        };
        old_head.link.publish(item);
    }

    /// Current head of the chain, without blocking.
    pub fn head(&self) -> Arc<BufferItem> {
        Arc::clone(&self.head.read())
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// One published batch: events sharing a commit index, or an error, plus the
/// forward link to the next batch.
#[derive(Debug)]
pub struct BufferItem {
    /// Events in this batch. Empty for sentinel and follow items.
    events: Vec<Event>,
    /// Terminal error; followers reaching this item fail with it.
    err: Option<StreamError>,
    /// Forward link, shared with any follow items attached after this one.
    link: Arc<BufferLink>,
}

/// Write-once forward link with a notifier for waiting readers.
#[derive(Debug, Default)]
struct BufferLink {
    /// Set exactly once, with release semantics; readers load with acquire
    /// so a fully constructed item is visible before the link is.
    next: OnceLock<Arc<BufferItem>>,
    /// Woken (all waiters at once) when `next` is set.
    ready: Notify,
}

impl BufferLink {
    fn publish(&self, next: Arc<BufferItem>) {
        // The chain is append-only: each link is written exactly once.
        let fresh = self.next.set(next).is_ok();
        debug_assert!(fresh, "buffer item link published twice");
        self.ready.notify_waiters();
    }
}

impl BufferItem {
    fn sentinel() -> Self {
        Self {
            events: Vec::new(),
            err: None,
            link: Arc::new(BufferLink::default()),
        }
    }

    fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            err: None,
            link: Arc::new(BufferLink::default()),
        }
    }

    fn error(err: StreamError) -> Self {
        Self {
            events: Vec::new(),
            err: Some(err),
            link: Arc::new(BufferLink::default()),
        }
    }

    /// Events in this batch.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Terminal error carried by this item, if any.
    pub fn err(&self) -> Option<&StreamError> {
        self.err.as_ref()
    }

    /// Commit index of the first event in the batch, if the batch is
    /// non-empty.
    pub fn first_index(&self) -> Option<u64> {
        self.events.first().map(|e| e.index)
    }

    /// Wait for the next batch in the chain.
    ///
    /// Returns the next item once published, `StreamError::Cancelled` when
    /// `cancel` fires first, or the item's error if the next item is an error
    /// item.
    pub async fn next(&self, cancel: &CancellationToken) -> Result<Arc<BufferItem>> {
        loop {
            // Register interest before checking the link so a publish between
            // the check and the await cannot be missed.
            let ready = self.link.ready.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();

            if let Some(next) = self.link.next.get() {
                if let Some(err) = &next.err {
                    return Err(err.clone());
                }
                return Ok(Arc::clone(next));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                _ = &mut ready => {}
            }
        }
    }

    /// The next batch if one has been published, without waiting.
    pub fn next_no_block(&self) -> Option<Arc<BufferItem>> {
        self.link.next.get().cloned()
    }

    /// An empty item positioned in the chain directly after this one.
    ///
    /// The returned item shares this item's forward link, so appending it to
    /// another buffer attaches that buffer to everything published after this
    /// item - and nothing at or before it. Chain truncation is unsupported,
    /// so the handle never dangles.
    pub fn follow_after(&self) -> Arc<BufferItem> {
        Arc::new(Self {
            events: Vec::new(),
            err: None,
            link: Arc::clone(&self.link),
        })
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod tests;
