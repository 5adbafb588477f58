//! Event model
//!
//! An `Event` is one state change delivered to subscribers: a topic, a filter
//! key, the monotonic commit index that produced it, and a topic-specific
//! payload. Control markers (`EndOfSnapshot`, `ResumeStream`) are payload
//! kinds distinguished by variant, never by index.

use std::fmt;

use ripple_protocol::{AclPolicy, AclRole, AclToken, ChangeOp, ServiceInstance};

/// Event category. Each topic has at most one live append-only buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Service catalog health updates, keyed by service name.
    ServiceHealth,
    /// ACL token changes. Internal: drives subscription invalidation.
    AclTokens,
    /// ACL policy changes. Internal: drives subscription invalidation.
    AclPolicies,
    /// ACL role changes. Internal: drives subscription invalidation.
    AclRoles,
}

impl Topic {
    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceHealth => "service-health",
            Self::AclTokens => "acl-tokens",
            Self::AclPolicies => "acl-policies",
            Self::AclRoles => "acl-roles",
        }
    }

    /// True for the topics that feed the authorization-invalidation protocol.
    #[inline]
    pub fn is_acl(&self) -> bool {
        matches!(self, Self::AclTokens | Self::AclPolicies | Self::AclRoles)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Topic-specific event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Marks the seam between snapshot events and the live tail.
    EndOfSnapshot,
    /// First event on the resume fast path: the subscriber's cached state is
    /// still valid and the stream continues from its last-seen index.
    ResumeStream,
    /// A service instance was registered, updated, or deregistered.
    ServiceHealth {
        /// What happened to the instance.
        op: ChangeOp,
        /// The instance (pre-delete row for deregistrations).
        instance: ServiceInstance,
    },
    /// An ACL token row changed.
    AclToken(AclToken),
    /// An ACL policy row changed.
    AclPolicy(AclPolicy),
    /// An ACL role row changed.
    AclRole(AclRole),
}

impl Payload {
    /// True for the control markers that are delivered to every subscriber
    /// regardless of key filter.
    #[inline]
    pub fn is_control(&self) -> bool {
        matches!(self, Self::EndOfSnapshot | Self::ResumeStream)
    }
}

/// One event on a topic stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event category.
    pub topic: Topic,
    /// Filter key (e.g. a service name). Empty for unkeyed events.
    pub key: String,
    /// Monotonic commit index of the store transaction that produced the
    /// event. Non-decreasing along a topic buffer.
    pub index: u64,
    /// Topic-specific payload.
    pub payload: Payload,
}

impl Event {
    /// True if this is the end-of-snapshot marker.
    pub fn is_end_of_snapshot(&self) -> bool {
        matches!(self.payload, Payload::EndOfSnapshot)
    }

    /// True if this is the resume-stream marker.
    pub fn is_resume_stream(&self) -> bool {
        matches!(self.payload, Payload::ResumeStream)
    }
}
