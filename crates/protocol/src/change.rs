//! Typed change records
//!
//! A store commit produces a list of `Change` records, one per mutated row,
//! tagged with the table the row belongs to. For deletions the record carries
//! the row as it was before the delete, so downstream consumers can still see
//! which entity disappeared.

use serde::{Deserialize, Serialize};

use crate::acl::{AclPolicy, AclRole, AclToken};
use crate::health::ServiceInstance;

/// The kind of mutation a change record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeOp {
    /// Row did not exist before the commit.
    Create,
    /// Row existed and was modified.
    Update,
    /// Row was removed; the record carries the pre-delete row.
    Delete,
}

/// One changed row from a store commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    /// A row in the ACL token table changed.
    AclToken {
        /// Mutation kind.
        op: ChangeOp,
        /// The row (pre-delete row for deletions).
        token: AclToken,
    },
    /// A row in the ACL policy table changed.
    AclPolicy {
        /// Mutation kind.
        op: ChangeOp,
        /// The row (pre-delete row for deletions).
        policy: AclPolicy,
    },
    /// A row in the ACL role table changed.
    AclRole {
        /// Mutation kind.
        op: ChangeOp,
        /// The row (pre-delete row for deletions).
        role: AclRole,
    },
    /// A row in the service catalog changed.
    Service {
        /// Mutation kind.
        op: ChangeOp,
        /// The row (pre-delete row for deletions).
        instance: ServiceInstance,
    },
}

impl Change {
    /// The mutation kind of this change.
    pub fn op(&self) -> ChangeOp {
        match self {
            Self::AclToken { op, .. }
            | Self::AclPolicy { op, .. }
            | Self::AclRole { op, .. }
            | Self::Service { op, .. } => *op,
        }
    }

    /// True for changes to any of the ACL tables.
    pub fn is_acl(&self) -> bool {
        matches!(
            self,
            Self::AclToken { .. } | Self::AclPolicy { .. } | Self::AclRole { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_op_accessor() {
        let change = Change::AclToken {
            op: ChangeOp::Delete,
            token: AclToken::new("acc", "sec"),
        };
        assert_eq!(change.op(), ChangeOp::Delete);
        assert!(change.is_acl());

        let change = Change::Service {
            op: ChangeOp::Create,
            instance: ServiceInstance::new("node1", "web"),
        };
        assert_eq!(change.op(), ChangeOp::Create);
        assert!(!change.is_acl());
    }
}
