//! Ripple Stream - ordered, filtered, multi-subscriber event streaming
//!
//! This crate is the in-process streaming core: it turns batches of state
//! change events into per-topic append-only chains that many subscribers can
//! follow concurrently, each starting from a snapshot of current state.
//!
//! # Architecture
//!
//! ```text
//! EventPublisher (ripple-state)
//!     │ append per topic
//!     ▼
//! EventBuffer ──► BufferItem ──► BufferItem ──► ...   (append-only chain)
//!                     ▲               ▲
//!                     │               │
//!              Subscription A   Subscription B        (independent cursors)
//!                     ▲
//!                     │ spliced after EndOfSnapshot
//!              EventSnapshot (private buffer)
//! ```
//!
//! - One writer per buffer (serialized by the publisher); readers walk the
//!   chain without locks, waiting on a per-item notifier for the next batch.
//! - A subscription first consumes a materialized snapshot of current state,
//!   sees the `EndOfSnapshot` marker, then follows the live chain.
//! - Reconnecting subscribers whose last-seen index still sits at the head of
//!   the topic chain skip the snapshot and get a `ResumeStream` marker.

pub mod buffer;
mod error;
pub mod event;
pub mod snapshot;
pub mod subscription;

pub use buffer::{BufferItem, EventBuffer};
pub use error::{Result, StreamError};
pub use event::{Event, Payload, Topic};
pub use snapshot::{EventSnapshot, SnapshotFn};
pub use subscription::{SubscribeRequest, Subscription};
