//! Ripple State - store-facing event publishing
//!
//! This crate connects a transactional state store to the streaming core in
//! `ripple-stream`:
//!
//! - `TopicRegistry` maps each topic to its snapshot builder and change
//!   processor, installed once at startup.
//! - `EventPublisher` receives commit change sets, turns them into events on
//!   the commit path, and fans them out to per-topic buffers from a single
//!   background worker.
//! - ACL token, policy, and role changes never reach subscribers directly;
//!   they force-reload exactly the subscriptions whose effective permissions
//!   may have changed, so clients re-authorize by resubscribing.
//! - `MemoryState` is a reference in-memory store for tests and embedding
//!   examples.
//!
//! The state store itself is a black box behind the `StateView` trait: a
//! read-only view created on the commit path that stays valid after the
//! commit, handed to the worker for ACL relation queries.

pub mod acl_events;
mod error;
pub mod memory;
pub mod publisher;
pub mod registry;
pub mod view;

pub use acl_events::acl_events_from_changes;
pub use error::{BoxError, Result, StateError};
pub use memory::{MemoryState, MemoryView};
pub use publisher::{EventPublisher, PublisherConfig};
pub use registry::{ProcessChangesFn, TopicHandlers, TopicRegistry};
pub use view::StateView;
