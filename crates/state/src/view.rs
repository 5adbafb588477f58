//! Read-only state view
//!
//! The publisher never talks to the state store directly. The commit path
//! creates a `StateView` - a consistent read-only view that stays valid after
//! the write transaction commits (an MVCC snapshot handle) - and hands it
//! across the channel to the publisher worker, which owns it exclusively and
//! drops it once the commit's events are processed.

use ripple_protocol::{AclRole, AclToken};

use crate::error::Result;

/// A consistent read-only view of the state store.
///
/// Used by the worker to expand ACL relations while deciding which
/// subscriptions an ACL change invalidates. Implementations must be safe to
/// use after the originating write transaction has committed.
pub trait StateView: Send + Sync {
    /// Tokens linking `policy_id` directly.
    fn tokens_linked_to_policy(&self, policy_id: &str) -> Result<Vec<AclToken>>;

    /// Roles granting `policy_id`. Roles do not nest, so this is the only
    /// indirection level the invalidation protocol has to follow.
    fn roles_linked_to_policy(&self, policy_id: &str) -> Result<Vec<AclRole>>;

    /// Tokens linking `role_id`.
    fn tokens_linked_to_role(&self, role_id: &str) -> Result<Vec<AclToken>>;
}
