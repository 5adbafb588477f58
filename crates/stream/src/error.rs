//! Error types for the streaming core

use thiserror::Error;

use crate::event::Topic;

/// Result type for streaming operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors surfaced to subscribers
///
/// Terminal subscription errors are cloneable so a subscription can keep
/// returning the error that closed it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Subscribing to a topic with no registered snapshot handler
    #[error("unknown topic: {0}")]
    UnknownTopic(Topic),

    /// The server invalidated the subscription; the client must throw away
    /// any state derived from it and subscribe again
    #[error("subscription closed by server, client must reset state and resubscribe")]
    SubscriptionReload,

    /// The subscriber's cancellation token fired
    #[error("subscription cancelled")]
    Cancelled,

    /// The topic snapshot function failed
    #[error("snapshot failed: {0}")]
    Snapshot(String),
}

impl StreamError {
    /// Create a Snapshot error
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot(message.into())
    }
}
