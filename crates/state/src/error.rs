//! Error types for store-facing publishing

use thiserror::Error;

use ripple_stream::Topic;

/// Result type for publishing operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Boxed error for topic handler callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors on the commit and invalidation paths
#[derive(Error, Debug)]
pub enum StateError {
    /// A topic's change processor failed; the commit must be aborted
    #[error("failed generating events for topic {topic}: {message}")]
    ChangeProcessing {
        /// Topic whose processor failed
        topic: Topic,
        /// Underlying error message
        message: String,
    },

    /// An ACL relation query failed during subscription invalidation
    #[error("acl invalidation query failed: {0}")]
    AclQuery(String),

    /// The publisher worker has stopped; commits can no longer publish
    #[error("event publisher is not running")]
    PublisherStopped,
}

impl StateError {
    /// Create a ChangeProcessing error
    pub fn change_processing(topic: Topic, source: BoxError) -> Self {
        Self::ChangeProcessing {
            topic,
            message: source.to_string(),
        }
    }

    /// Create an AclQuery error
    pub fn acl_query(message: impl Into<String>) -> Self {
        Self::AclQuery(message.into())
    }
}
